use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Byte range into the source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// Root node of a parsed stylesheet.
///
/// Behaves like a ruleset without selectors: its rules are evaluated in the
/// outermost scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stylesheet {
    pub rules: Vec<StyleNode>,
    pub span: Span,
}

/// A node in a rule body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StyleNode {
    Ruleset(Ruleset),
    Declaration(Declaration),
    VariableDef(VariableDef),
    MixinDef(MixinDef),
    MixinCall(MixinCall),
    AtRule(AtRule),
    Comment(Comment),
}

impl StyleNode {
    pub fn span(&self) -> Span {
        match self {
            StyleNode::Ruleset(r) => r.span,
            StyleNode::Declaration(d) => d.span,
            StyleNode::VariableDef(v) => v.span,
            StyleNode::MixinDef(m) => m.span,
            StyleNode::MixinCall(c) => c.span,
            StyleNode::AtRule(a) => a.span,
            StyleNode::Comment(c) => c.span,
        }
    }
}

/// Selector list plus block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub selectors: Vec<Selector>,
    pub rules: Vec<StyleNode>,
    pub span: Span,
}

impl Ruleset {
    /// Name under which this ruleset can be called as a mixin (`.a`, `#ns`).
    ///
    /// Only rulesets with a single selector made of one class or id qualify.
    pub fn mixin_name(&self) -> Option<&str> {
        match self.selectors.as_slice() {
            [selector] => match selector.elements.as_slice() {
                [element] if is_mixin_name(&element.value) => Some(&element.value),
                _ => None,
            },
            _ => None,
        }
    }
}

/// `.name` or `#name` with no further simple selectors attached
pub fn is_mixin_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some('.') | Some('#') => {}
        _ => return false,
    }
    let rest = chars.as_str();
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    pub elements: Vec<SelectorElement>,
    pub span: Span,
}

impl Selector {
    /// Whether any element references the parent selector with `&`
    pub fn has_parent_ref(&self) -> bool {
        self.elements.iter().any(|e| e.value.contains('&'))
    }

    pub fn to_css(&self, compress: bool) -> String {
        let mut out = String::new();
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 || element.combinator != Combinator::None {
                out.push_str(element.combinator.as_css(compress));
            }
            out.push_str(&element.value);
        }
        out.trim().to_string()
    }
}

/// A compound selector (`a.b:hover`) and the combinator before it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorElement {
    pub combinator: Combinator,
    pub value: String,
}

impl SelectorElement {
    pub fn new(combinator: Combinator, value: impl Into<String>) -> Self {
        Self {
            combinator,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combinator {
    /// First element of a selector, or glued to the previous one (`&:hover`)
    None,
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

impl Combinator {
    pub fn as_css(self, compress: bool) -> &'static str {
        match (self, compress) {
            (Combinator::None, _) => "",
            (Combinator::Descendant, _) => " ",
            (Combinator::Child, false) => " > ",
            (Combinator::Child, true) => ">",
            (Combinator::Adjacent, false) => " + ",
            (Combinator::Adjacent, true) => "+",
            (Combinator::Sibling, false) => " ~ ",
            (Combinator::Sibling, true) => "~",
        }
    }
}

/// `property: value [!important];`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// May contain `@{name}` interpolations
    pub property: String,
    pub value: Expression,
    pub important: bool,
    pub span: Span,
}

/// `@name: value;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    /// Name without the leading `@`
    pub name: String,
    pub value: Expression,
    pub span: Span,
}

/// `.name(@a; @b: 2) { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixinDef {
    /// Including the leading `.` or `#`
    pub name: String,
    pub params: Vec<MixinParam>,
    pub guard: Option<Guard>,
    pub rules: Vec<StyleNode>,
    pub span: Span,
}

impl MixinDef {
    /// Parameters that must be supplied by the caller
    pub fn required_params(&self) -> usize {
        self.params
            .iter()
            .filter(|p| match p {
                MixinParam::Named { default, .. } => default.is_none(),
                MixinParam::Pattern(_) => true,
                MixinParam::Variadic { .. } => false,
            })
            .count()
    }

    pub fn is_variadic(&self) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, MixinParam::Variadic { .. }))
    }
}

/// `when (@a > 0) and (@b), not (@c)`: the mixin applies when any
/// alternative holds; an alternative holds when all of its conditions do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub alternatives: Vec<Vec<Condition>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub negated: bool,
    pub left: Expression,
    /// Without a comparison, `left` must evaluate to `true`
    pub comparison: Option<(CompareOp, Expression)>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "=<",
            CompareOp::Eq => "=",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MixinParam {
    Named {
        name: String,
        default: Option<Expression>,
    },
    /// A literal the argument must equal for the mixin to match
    Pattern(Expression),
    /// `...` or `@rest...`
    Variadic { name: Option<String> },
}

/// `.name(args) [!important];` or `#ns > .name;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixinCall {
    /// Namespace path, e.g. `["#ns", ".button"]`
    pub path: Vec<String>,
    pub args: Vec<MixinArg>,
    pub important: bool,
    pub span: Span,
}

impl MixinCall {
    pub fn display_name(&self) -> String {
        self.path.join(" > ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixinArg {
    /// Set for named arguments (`@color: red`)
    pub name: Option<String>,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRule {
    /// Name without the leading `@`
    pub name: String,
    pub prelude: String,
    pub body: AtRuleBody,
    pub span: Span,
}

impl AtRule {
    pub fn kind(&self) -> AtRuleKind {
        match self.body {
            AtRuleBody::Statement => AtRuleKind::Statement,
            AtRuleBody::Raw(_) => AtRuleKind::Opaque,
            AtRuleBody::Rules(_) => at_rule_kind(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AtRuleBody {
    /// `@import "a.css";`
    Statement,
    /// Parsed block
    Rules(Vec<StyleNode>),
    /// Block of an unknown at-rule, verbatim
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtRuleKind {
    /// `@media`, `@supports`, ... bubble out of rulesets
    Conditional,
    /// `@font-face`, `@keyframes`, ... own their selectors
    Directive,
    Statement,
    /// Unknown block at-rule, passed through untouched
    Opaque,
}

/// Classify an at-rule with a block by name
pub fn at_rule_kind(name: &str) -> AtRuleKind {
    let name = name.to_ascii_lowercase();
    let unprefixed = strip_vendor_prefix(&name);
    match unprefixed {
        "media" | "supports" | "container" | "document" | "layer" => AtRuleKind::Conditional,
        "font-face" | "page" | "keyframes" | "viewport" | "counter-style" => {
            AtRuleKind::Directive
        }
        _ => AtRuleKind::Opaque,
    }
}

fn strip_vendor_prefix(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix('-') {
        if let Some(idx) = rest.find('-') {
            return &rest[idx + 1..];
        }
    }
    name
}

/// `/* ... */`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Number {
        value: f64,
        unit: Option<String>,
        span: Span,
    },
    /// Hex color as written, including `#`
    Color { hex: String, span: Span },
    String {
        /// Content without quotes
        value: String,
        quote: char,
        /// `~"..."`: emitted without quotes
        escaped: bool,
        span: Span,
    },
    Keyword { value: String, span: Span },
    /// `url(...)` as written, quoted or not
    Url { value: String, span: Span },
    /// `alpha(opacity=50)`
    Alpha { value: Box<Expression>, span: Span },
    /// `@name`, stored without `@`
    Variable { name: String, span: Span },
    /// `@@name`: the variable named by the value of `@name`
    VariableVariable { name: String, span: Span },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    Negate {
        operand: Box<Expression>,
        span: Span,
    },
    Paren {
        inner: Box<Expression>,
        span: Span,
    },
    Call {
        name: String,
        args: Vec<Expression>,
        span: Span,
    },
    List {
        items: Vec<Expression>,
        separator: ListSeparator,
        span: Span,
    },
    /// `a/b` outside parentheses, kept as a separator (`font: 12px/1.5`)
    Slash {
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Number { span, .. }
            | Expression::Color { span, .. }
            | Expression::String { span, .. }
            | Expression::Keyword { span, .. }
            | Expression::Url { span, .. }
            | Expression::Alpha { span, .. }
            | Expression::Variable { span, .. }
            | Expression::VariableVariable { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Negate { span, .. }
            | Expression::Paren { span, .. }
            | Expression::Call { span, .. }
            | Expression::List { span, .. }
            | Expression::Slash { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListSeparator {
    Space,
    Comma,
}
