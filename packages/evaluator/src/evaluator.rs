//! Expression evaluation and mixin expansion
//!
//! Walks the stylesheet depth-first in document order. Each ruleset and each
//! mixin call gets its own [`Scope`]; variable definitions bind into the
//! scope they appear in, so a later sibling never changes an earlier value.
//! Mixin bodies are the exception: their variable definitions are hoisted
//! before the body runs, which allows forward references inside mixins.

use crate::error::{EvalError, EvalResult};
use crate::functions::call_function;
use crate::scope::{MixinCandidate, Scope};
use crate::value::{compare, negate, operate, Value};
use lessrs_parser::ast::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Deepest allowed chain of nested mixin calls
pub const MAX_MIXIN_DEPTH: usize = 100;

/// Functions whose arguments are CSS, not LESS arithmetic
const RAW_FUNCTIONS: &[&str] = &["calc", "url", "var", "env", "attr", "counter", "format", "local"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedStylesheet {
    pub nodes: Vec<EvaluatedNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvaluatedNode {
    Ruleset(EvaluatedRuleset),
    AtRule(EvaluatedAtRule),
    Comment(String),
}

/// A ruleset with selectors interpolated; nesting is still intact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedRuleset {
    pub selectors: Vec<Selector>,
    pub body: Block,
}

/// Contents of a ruleset or block at-rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Declarations and comments, in source order
    pub items: Vec<BodyItem>,
    /// Nested rulesets and at-rules, in source order
    pub children: Vec<EvaluatedNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyItem {
    Declaration(EvaluatedDeclaration),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedDeclaration {
    pub property: String,
    pub value: Value,
    pub important: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedAtRule {
    pub name: String,
    pub prelude: String,
    pub body: EvaluatedAtRuleBody,
}

impl EvaluatedAtRule {
    pub fn kind(&self) -> AtRuleKind {
        match self.body {
            EvaluatedAtRuleBody::Statement => AtRuleKind::Statement,
            EvaluatedAtRuleBody::Raw(_) => AtRuleKind::Opaque,
            EvaluatedAtRuleBody::Block(_) => at_rule_kind(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvaluatedAtRuleBody {
    Statement,
    Raw(String),
    Block(Block),
}

/// Where a block is being evaluated
#[derive(Debug, Clone, Copy)]
struct Ctx {
    /// Declarations have a ruleset to land in
    in_rule: bool,
    /// Set by `!important` on an enclosing mixin call
    important: bool,
    /// Variable definitions were already evaluated (mixin bodies)
    hoisted: bool,
}

impl Ctx {
    const ROOT: Ctx = Ctx {
        in_rule: false,
        important: false,
        hoisted: false,
    };

    const RULE: Ctx = Ctx {
        in_rule: true,
        important: false,
        hoisted: false,
    };
}

/// Value bound to a mixin parameter
#[derive(Clone)]
enum Binding<'a> {
    Value(Value),
    /// Default expression, evaluated once earlier parameters are bound
    Default(&'a Expression),
}

/// Outcome of matching call arguments against one mixin
struct MixinMatch<'a> {
    params: Vec<(String, Binding<'a>)>,
    /// Every argument in parameter order, for `@arguments`
    arguments: Vec<Binding<'a>>,
}

/// Evaluator
#[derive(Debug, Default)]
pub struct Evaluator {
    /// Names of the mixins currently being expanded
    mixin_stack: Vec<String>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a parsed stylesheet
    #[instrument(skip(self, sheet), fields(rules = sheet.rules.len()))]
    pub fn evaluate(&mut self, sheet: &Stylesheet) -> EvalResult<EvaluatedStylesheet> {
        info!("Starting evaluation");
        self.mixin_stack.clear();

        let mut scope = Scope::root();
        scope.register(&sheet.rules);
        let mut root = Block::default();
        self.eval_rules(&sheet.rules, &mut scope, &mut root, Ctx::ROOT)?;

        info!(nodes = root.children.len(), "Evaluation complete");
        Ok(EvaluatedStylesheet {
            nodes: root.children,
        })
    }

    fn eval_rules<'s>(
        &mut self,
        rules: &'s [StyleNode],
        scope: &mut Scope<'s>,
        out: &mut Block,
        ctx: Ctx,
    ) -> EvalResult<()> {
        for node in rules {
            match node {
                StyleNode::Comment(comment) => {
                    if ctx.in_rule {
                        out.items.push(BodyItem::Comment(comment.text.clone()));
                    } else {
                        out.children.push(EvaluatedNode::Comment(comment.text.clone()));
                    }
                }
                StyleNode::VariableDef(var) => {
                    if !ctx.hoisted {
                        let value = self.eval_expr(&var.value, scope)?;
                        debug!(name = %var.name, value = %value.to_css(false), "Variable bound");
                        scope.define(&var.name, value);
                    }
                }
                StyleNode::Declaration(decl) => {
                    if !ctx.in_rule {
                        return Err(EvalError::DeclarationOutsideRuleset { span: decl.span });
                    }
                    let decl = self.eval_declaration(decl, scope, ctx.important)?;
                    out.items.push(BodyItem::Declaration(decl));
                }
                StyleNode::Ruleset(ruleset) => {
                    let ruleset = self.eval_ruleset(ruleset, scope)?;
                    out.children.push(EvaluatedNode::Ruleset(ruleset));
                }
                StyleNode::MixinDef(_) => {}
                StyleNode::MixinCall(call) => self.expand_mixin(call, scope, out, ctx)?,
                StyleNode::AtRule(at_rule) => {
                    let at_rule = self.eval_at_rule(at_rule, scope, ctx)?;
                    out.children.push(EvaluatedNode::AtRule(at_rule));
                }
            }
        }
        Ok(())
    }

    fn eval_ruleset<'s>(
        &mut self,
        ruleset: &'s Ruleset,
        scope: &'s Scope<'s>,
    ) -> EvalResult<EvaluatedRuleset> {
        let selectors = ruleset
            .selectors
            .iter()
            .map(|selector| self.interpolate_selector(selector, scope))
            .collect::<EvalResult<Vec<_>>>()?;

        let mut child = Scope::child(scope);
        child.register(&ruleset.rules);
        let mut body = Block::default();
        self.eval_rules(&ruleset.rules, &mut child, &mut body, Ctx::RULE)?;

        Ok(EvaluatedRuleset { selectors, body })
    }

    fn eval_declaration(
        &mut self,
        decl: &Declaration,
        scope: &Scope,
        important: bool,
    ) -> EvalResult<EvaluatedDeclaration> {
        let property = self.substitute(&decl.property, scope, decl.span, false)?;
        let value = self.eval_expr(&decl.value, scope)?;
        Ok(EvaluatedDeclaration {
            property,
            value,
            important: decl.important || important,
        })
    }

    fn eval_at_rule<'s>(
        &mut self,
        at_rule: &'s AtRule,
        scope: &'s Scope<'s>,
        ctx: Ctx,
    ) -> EvalResult<EvaluatedAtRule> {
        let kind = at_rule.kind();
        let prelude = self.substitute(
            &at_rule.prelude,
            scope,
            at_rule.span,
            kind == AtRuleKind::Conditional,
        )?;

        let body = match &at_rule.body {
            AtRuleBody::Statement => EvaluatedAtRuleBody::Statement,
            AtRuleBody::Raw(raw) => EvaluatedAtRuleBody::Raw(raw.clone()),
            AtRuleBody::Rules(rules) => {
                let inner = match kind {
                    // Declarations belong to the enclosing ruleset
                    AtRuleKind::Conditional => Ctx {
                        hoisted: false,
                        ..ctx
                    },
                    _ => Ctx::RULE,
                };
                let mut child = Scope::child(scope);
                child.register(rules);
                let mut block = Block::default();
                self.eval_rules(rules, &mut child, &mut block, inner)?;
                EvaluatedAtRuleBody::Block(block)
            }
        };

        debug!(name = %at_rule.name, prelude = %prelude, "Evaluated at-rule");
        Ok(EvaluatedAtRule {
            name: at_rule.name.clone(),
            prelude,
            body,
        })
    }

    // ---------------------------------------------------------------------
    // Mixins
    // ---------------------------------------------------------------------

    fn expand_mixin<'s>(
        &mut self,
        call: &'s MixinCall,
        scope: &mut Scope<'s>,
        out: &mut Block,
        ctx: Ctx,
    ) -> EvalResult<()> {
        let name = call.display_name();
        if self.mixin_stack.len() >= MAX_MIXIN_DEPTH {
            return Err(EvalError::RecursionLimitExceeded {
                name,
                limit: MAX_MIXIN_DEPTH,
                span: call.span,
            });
        }

        let args = call
            .args
            .iter()
            .map(|arg| -> EvalResult<_> {
                Ok((arg.name.as_deref(), self.eval_expr(&arg.value, scope)?))
            })
            .collect::<EvalResult<Vec<_>>>()?;

        let candidates = self.find_candidates(call, scope)?;
        let mut matched = Vec::new();
        for candidate in candidates {
            if let Some(bindings) = self.match_candidate(candidate, &args, scope)? {
                matched.push((candidate, bindings));
            }
        }
        if matched.is_empty() {
            return Err(EvalError::NoMatchingMixin {
                name,
                args: args.len(),
                span: call.span,
            });
        }

        debug!(mixin = %name, candidates = matched.len(), depth = self.mixin_stack.len(), "Expanding mixin");
        self.mixin_stack.push(name);

        let inner = Ctx {
            important: ctx.important || call.important,
            hoisted: true,
            ..ctx
        };
        for (candidate, bindings) in &matched {
            let mut params = Scope::child(scope);
            self.bind_params(bindings, &mut params)?;
            if let Some(guard) = candidate.guard() {
                if !self.eval_guard(guard, &params)? {
                    debug!(mixin = candidate.name(), "Guard did not hold");
                    continue;
                }
            }
            params.register(candidate.rules());
            self.hoist_variables(candidate.rules(), &mut params)?;
            self.eval_rules(candidate.rules(), &mut params, out, inner)?;
        }

        self.mixin_stack.pop();
        Ok(())
    }

    /// Resolve the call path, descending into namespaces
    fn find_candidates<'s>(
        &self,
        call: &MixinCall,
        scope: &Scope<'s>,
    ) -> EvalResult<Vec<MixinCandidate<'s>>> {
        let undefined = || EvalError::UndefinedMixin {
            name: call.display_name(),
            span: call.span,
        };

        let (first, rest) = call.path.split_first().ok_or_else(undefined)?;
        let mut candidates = scope.find_mixins(first);

        for segment in rest {
            candidates = candidates
                .iter()
                .flat_map(|namespace| namespace.rules())
                .filter_map(|node| match node {
                    StyleNode::MixinDef(def) if def.name == *segment => {
                        Some(MixinCandidate::Def(def))
                    }
                    StyleNode::Ruleset(ruleset) if ruleset.mixin_name() == Some(segment.as_str()) => {
                        Some(MixinCandidate::Ruleset(ruleset))
                    }
                    _ => None,
                })
                .collect();
        }

        if candidates.is_empty() {
            return Err(undefined());
        }
        Ok(candidates)
    }

    /// Bindings for each parameter (plus `@arguments`), or `None` when the
    /// arguments do not fit
    fn match_candidate<'s>(
        &mut self,
        candidate: MixinCandidate<'s>,
        args: &[(Option<&str>, Value)],
        scope: &Scope,
    ) -> EvalResult<Option<MixinMatch<'s>>> {
        let def = match candidate {
            MixinCandidate::Def(def) => def,
            MixinCandidate::Ruleset(_) => {
                return Ok(args.is_empty().then(|| MixinMatch {
                    params: Vec::new(),
                    arguments: Vec::new(),
                }));
            }
        };

        for (name, _) in args {
            if let Some(name) = name {
                let known = def
                    .params
                    .iter()
                    .any(|p| matches!(p, MixinParam::Named { name: n, .. } if n == name));
                if !known {
                    return Ok(None);
                }
            }
        }

        let mut positional = args.iter().filter(|(name, _)| name.is_none()).map(|(_, v)| v);
        let mut params = Vec::new();
        let mut arguments = Vec::new();

        for param in &def.params {
            match param {
                MixinParam::Named { name, default } => {
                    let named = args
                        .iter()
                        .find(|(n, _)| *n == Some(name.as_str()))
                        .map(|(_, v)| v);
                    let binding = match (named.or_else(|| positional.next()), default) {
                        (Some(value), _) => Binding::Value(value.clone()),
                        (None, Some(expr)) => Binding::Default(expr),
                        (None, None) => return Ok(None),
                    };
                    arguments.push(binding.clone());
                    params.push((name.clone(), binding));
                }
                MixinParam::Pattern(pattern) => {
                    let Some(value) = positional.next() else {
                        return Ok(None);
                    };
                    let expected = self.eval_expr(pattern, scope)?;
                    if expected.to_css(false) != value.to_css(false) {
                        return Ok(None);
                    }
                    arguments.push(Binding::Value(value.clone()));
                }
                MixinParam::Variadic { name } => {
                    let rest: Vec<Value> = positional.by_ref().cloned().collect();
                    arguments.extend(rest.iter().cloned().map(Binding::Value));
                    if let Some(name) = name {
                        params.push((name.clone(), Binding::Value(space_list(rest))));
                    }
                }
            }
        }

        // Surplus arguments bind to nothing but stay in @arguments
        arguments.extend(positional.cloned().map(Binding::Value));

        Ok(Some(MixinMatch { params, arguments }))
    }

    /// Whether any alternative of a guard holds
    fn eval_guard(&mut self, guard: &Guard, scope: &Scope) -> EvalResult<bool> {
        for conditions in &guard.alternatives {
            let mut holds = true;
            for condition in conditions {
                if !self.eval_condition(condition, scope)? {
                    holds = false;
                    break;
                }
            }
            if holds {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn eval_condition(&mut self, condition: &Condition, scope: &Scope) -> EvalResult<bool> {
        let left = self.eval_expr(&condition.left, scope)?;
        let holds = match &condition.comparison {
            Some((op, right)) => {
                let right = self.eval_expr(right, scope)?;
                compare(*op, &left, &right)
            }
            None => left.is_true(),
        };
        Ok(holds != condition.negated)
    }

    fn bind_params(&mut self, matched: &MixinMatch, scope: &mut Scope) -> EvalResult<()> {
        for (name, binding) in &matched.params {
            let value = self.resolve_binding(binding, scope)?;
            debug!(param = %name, value = %value.to_css(false), "Parameter bound");
            scope.define(name, value);
        }

        let arguments = matched
            .arguments
            .iter()
            .map(|binding| self.resolve_binding(binding, scope))
            .collect::<EvalResult<Vec<_>>>()?;
        scope.define("arguments", space_list(arguments));
        Ok(())
    }

    fn resolve_binding(&mut self, binding: &Binding, scope: &Scope) -> EvalResult<Value> {
        match binding {
            Binding::Value(value) => Ok(value.clone()),
            Binding::Default(expr) => self.eval_expr(expr, scope),
        }
    }

    /// Evaluate a mixin body's variable definitions before the body itself,
    /// retrying those that refer to later definitions
    fn hoist_variables<'s>(&mut self, rules: &'s [StyleNode], scope: &mut Scope<'s>) -> EvalResult<()> {
        let mut remaining: Vec<&VariableDef> = rules
            .iter()
            .filter_map(|node| match node {
                StyleNode::VariableDef(var) => Some(var),
                _ => None,
            })
            .collect();

        while !remaining.is_empty() {
            let before = remaining.len();
            let mut deferred = Vec::new();
            let mut first_error = None;

            for var in remaining {
                match self.eval_expr(&var.value, scope) {
                    Ok(value) => scope.define(&var.name, value),
                    Err(err @ EvalError::UseBeforeDefinition { .. }) => {
                        first_error.get_or_insert(err);
                        deferred.push(var);
                    }
                    Err(err) => return Err(err),
                }
            }

            if deferred.len() == before {
                if let Some(err) = first_error {
                    return Err(err);
                }
            }
            remaining = deferred;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    /// Evaluate an expression to a value
    pub fn eval_expr(&mut self, expr: &Expression, scope: &Scope) -> EvalResult<Value> {
        match expr {
            Expression::Number { value, unit, .. } => Ok(Value::number(*value, unit.as_deref())),
            Expression::Color { hex, .. } => Ok(crate::value::Color::from_hex(hex)
                .map(Value::Color)
                .unwrap_or_else(|| Value::keyword(hex.clone()))),
            Expression::String {
                value,
                quote,
                escaped,
                span,
            } => Ok(Value::String {
                value: self.substitute(value, scope, *span, false)?,
                quote: (!escaped).then_some(*quote),
            }),
            Expression::Keyword { value, .. } => Ok(Value::keyword(value.clone())),
            Expression::Url { value, span } => self.eval_url(value, scope, *span),
            Expression::Alpha { value, .. } => Ok(Value::keyword(format!(
                "alpha(opacity={})",
                self.eval_expr(value, scope)?.to_css(false)
            ))),
            Expression::Variable { name, span } => self.lookup(name, scope, *span),
            Expression::VariableVariable { name, span } => {
                let inner = self.lookup(name, scope, *span)?.content();
                self.lookup(&inner, scope, *span)
            }
            Expression::Binary {
                op,
                left,
                right,
                span,
            } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                operate(*op, &left, &right, *span)
            }
            Expression::Negate { operand, span } => {
                let value = self.eval_expr(operand, scope)?;
                negate(&value, *span)
            }
            Expression::Paren { inner, .. } => self.eval_expr(inner, scope),
            Expression::Call { name, args, span } => self.eval_call(name, args, scope, *span),
            Expression::List {
                items, separator, ..
            } => Ok(Value::List {
                items: items
                    .iter()
                    .map(|item| self.eval_expr(item, scope))
                    .collect::<EvalResult<Vec<_>>>()?,
                separator: *separator,
            }),
            Expression::Slash { left, right, .. } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                Ok(Value::keyword(format!(
                    "{}/{}",
                    left.to_css(false),
                    right.to_css(false)
                )))
            }
        }
    }

    fn eval_call(
        &mut self,
        name: &str,
        args: &[Expression],
        scope: &Scope,
        span: Span,
    ) -> EvalResult<Value> {
        let lower = name.to_ascii_lowercase();
        if RAW_FUNCTIONS.contains(&lower.as_str()) {
            let args = args
                .iter()
                .map(|arg| self.render_raw(arg, scope))
                .collect::<EvalResult<Vec<_>>>()?;
            return Ok(Value::keyword(format!("{}({})", name, args.join(", "))));
        }

        let values = args
            .iter()
            .map(|arg| self.eval_expr(arg, scope))
            .collect::<EvalResult<Vec<_>>>()?;
        match call_function(name, &values, span)? {
            Some(value) => Ok(value),
            None => Ok(Value::Call {
                name: name.to_string(),
                args: values,
            }),
        }
    }

    /// CSS text of an expression with variables substituted but no math
    fn render_raw(&mut self, expr: &Expression, scope: &Scope) -> EvalResult<String> {
        Ok(match expr {
            Expression::Binary {
                op, left, right, ..
            } => format!(
                "{} {} {}",
                self.render_raw(left, scope)?,
                op.symbol(),
                self.render_raw(right, scope)?
            ),
            Expression::Slash { left, right, .. } => format!(
                "{}/{}",
                self.render_raw(left, scope)?,
                self.render_raw(right, scope)?
            ),
            Expression::Paren { inner, .. } => format!("({})", self.render_raw(inner, scope)?),
            Expression::Negate { operand, .. } => format!("-{}", self.render_raw(operand, scope)?),
            Expression::List {
                items, separator, ..
            } => {
                let sep = match separator {
                    ListSeparator::Space => " ",
                    ListSeparator::Comma => ", ",
                };
                items
                    .iter()
                    .map(|item| self.render_raw(item, scope))
                    .collect::<EvalResult<Vec<_>>>()?
                    .join(sep)
            }
            Expression::Call { name, args, .. } => {
                let args = args
                    .iter()
                    .map(|arg| self.render_raw(arg, scope))
                    .collect::<EvalResult<Vec<_>>>()?;
                format!("{}({})", name, args.join(", "))
            }
            other => self.eval_expr(other, scope)?.to_css(false),
        })
    }

    /// `url(@path)` takes the variable's value; otherwise only `@{name}`
    /// interpolation applies
    fn eval_url(&self, text: &str, scope: &Scope, span: Span) -> EvalResult<Value> {
        let inner = text
            .strip_prefix("url(")
            .and_then(|rest| rest.strip_suffix(')'))
            .map(str::trim)
            .unwrap_or_default();
        if let Some(name) = inner.strip_prefix('@') {
            if !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                let value = self.lookup(name, scope, span)?;
                return Ok(Value::keyword(format!("url({})", value.to_css(false))));
            }
        }
        Ok(Value::keyword(self.substitute(text, scope, span, false)?))
    }

    fn lookup(&self, name: &str, scope: &Scope, span: Span) -> EvalResult<Value> {
        match scope.lookup(name) {
            Some(value) => Ok(value.clone()),
            None if scope.is_pending(name) => Err(EvalError::UseBeforeDefinition {
                name: name.to_string(),
                span,
            }),
            None => Err(EvalError::UnresolvedVariable {
                name: name.to_string(),
                span,
            }),
        }
    }

    /// Replace `@{name}` in `text`; with `bare`, plain `@name` too
    fn substitute(&self, text: &str, scope: &Scope, span: Span, bare: bool) -> EvalResult<String> {
        if !text.contains('@') {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(idx) = rest.find('@') {
            out.push_str(&rest[..idx]);
            let after = &rest[idx + 1..];

            if let Some(inner) = after.strip_prefix('{') {
                if let Some(end) = inner.find('}') {
                    out.push_str(&self.lookup(&inner[..end], scope, span)?.content());
                    rest = &inner[end + 1..];
                    continue;
                }
            }

            if bare {
                let len = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                    .unwrap_or(after.len());
                if len > 0 {
                    out.push_str(&self.lookup(&after[..len], scope, span)?.to_css(false));
                    rest = &after[len..];
                    continue;
                }
            }

            out.push('@');
            rest = after;
        }
        out.push_str(rest);
        Ok(out)
    }

    fn interpolate_selector(&self, selector: &Selector, scope: &Scope) -> EvalResult<Selector> {
        let elements = selector
            .elements
            .iter()
            .map(|element| {
                Ok(SelectorElement::new(
                    element.combinator,
                    self.substitute(&element.value, scope, selector.span, false)?,
                ))
            })
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(Selector {
            elements,
            span: selector.span,
        })
    }
}

fn space_list(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        return items.remove(0);
    }
    Value::List {
        items,
        separator: ListSeparator::Space,
    }
}

/// Evaluate a stylesheet with a fresh evaluator
pub fn evaluate(sheet: &Stylesheet) -> EvalResult<EvaluatedStylesheet> {
    Evaluator::new().evaluate(sheet)
}
