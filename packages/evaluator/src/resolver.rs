//! Flattens nested rulesets into plain CSS rules.
//!
//! Child selectors are combined with every parent selector, and conditional
//! at-rules found inside rulesets bubble up to the enclosing level with the
//! current selectors wrapped inside them.

use crate::evaluator::{
    Block, BodyItem, EvaluatedAtRule, EvaluatedAtRuleBody, EvaluatedNode, EvaluatedStylesheet,
};
use lessrs_parser::ast::{AtRuleKind, Combinator, Selector, SelectorElement};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStylesheet {
    pub nodes: Vec<CssNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CssNode {
    Rule(CssRule),
    AtRule(CssAtRule),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CssRule {
    pub selectors: Vec<Selector>,
    pub items: Vec<BodyItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CssAtRule {
    pub name: String,
    pub prelude: String,
    pub body: CssAtRuleBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CssAtRuleBody {
    Statement,
    Raw(String),
    Block {
        /// Declarations placed directly in the at-rule (`@font-face`)
        items: Vec<BodyItem>,
        nodes: Vec<CssNode>,
    },
}

/// Enclosing conditional at-rule
struct Condition {
    name: String,
    prelude: String,
}

struct Context<'a> {
    parents: &'a [Selector],
    condition: Option<&'a Condition>,
}

/// Flatten an evaluated stylesheet
#[instrument(skip(sheet), fields(nodes = sheet.nodes.len()))]
pub fn resolve(sheet: &EvaluatedStylesheet) -> ResolvedStylesheet {
    let ctx = Context {
        parents: &[],
        condition: None,
    };
    let mut nodes = Vec::new();
    let mut hoisted = Vec::new();
    resolve_nodes(&sheet.nodes, &ctx, &mut nodes, &mut hoisted);
    nodes.append(&mut hoisted);

    info!(nodes = nodes.len(), "Resolution complete");
    ResolvedStylesheet { nodes }
}

/// `out` receives nodes at the current level; `hoisted` receives merged
/// conditionals that must follow the outermost enclosing one
fn resolve_nodes(
    nodes: &[EvaluatedNode],
    ctx: &Context,
    out: &mut Vec<CssNode>,
    hoisted: &mut Vec<CssNode>,
) {
    for node in nodes {
        match node {
            EvaluatedNode::Comment(text) => out.push(CssNode::Comment(text.clone())),
            EvaluatedNode::Ruleset(ruleset) => {
                let selectors = combine_selectors(ctx.parents, &ruleset.selectors);
                if !ruleset.body.items.is_empty() {
                    out.push(CssNode::Rule(CssRule {
                        selectors: selectors.clone(),
                        items: ruleset.body.items.clone(),
                    }));
                }
                let inner = Context {
                    parents: &selectors,
                    condition: ctx.condition,
                };
                resolve_nodes(&ruleset.body.children, &inner, out, hoisted);
            }
            EvaluatedNode::AtRule(at_rule) => resolve_at_rule(at_rule, ctx, out, hoisted),
        }
    }
}

fn resolve_at_rule(
    at_rule: &EvaluatedAtRule,
    ctx: &Context,
    out: &mut Vec<CssNode>,
    hoisted: &mut Vec<CssNode>,
) {
    let block = match &at_rule.body {
        EvaluatedAtRuleBody::Statement => {
            out.push(plain_at_rule(at_rule, CssAtRuleBody::Statement));
            return;
        }
        EvaluatedAtRuleBody::Raw(raw) => {
            out.push(plain_at_rule(at_rule, CssAtRuleBody::Raw(raw.clone())));
            return;
        }
        EvaluatedAtRuleBody::Block(block) => block,
    };

    if at_rule.kind() != AtRuleKind::Conditional {
        // Selectors do not reach into @font-face, @keyframes and friends
        let inner = Context {
            parents: &[],
            condition: None,
        };
        let mut nodes = Vec::new();
        let mut nested = Vec::new();
        resolve_nodes(&block.children, &inner, &mut nodes, &mut nested);
        nodes.append(&mut nested);
        out.push(plain_at_rule(
            at_rule,
            CssAtRuleBody::Block {
                items: block.items.clone(),
                nodes,
            },
        ));
        return;
    }

    match ctx.condition {
        Some(outer) if outer.name.eq_ignore_ascii_case(&at_rule.name) => {
            let merged = Condition {
                name: outer.name.clone(),
                prelude: format!("{} and {}", outer.prelude, at_rule.prelude),
            };
            debug!(name = %merged.name, prelude = %merged.prelude, "Merged nested at-rule");
            bubble(block, merged, ctx.parents, hoisted);
        }
        _ => {
            let condition = Condition {
                name: at_rule.name.clone(),
                prelude: at_rule.prelude.clone(),
            };
            if !ctx.parents.is_empty() {
                debug!(name = %condition.name, prelude = %condition.prelude, "Bubbled at-rule");
            }
            bubble(block, condition, ctx.parents, out);
        }
    }
}

/// Emit a conditional at-rule holding the current selectors; merged
/// conditionals found inside it land right after it in `out`
fn bubble(block: &Block, condition: Condition, parents: &[Selector], out: &mut Vec<CssNode>) {
    let mut items = Vec::new();
    let mut nodes = Vec::new();
    if !block.items.is_empty() {
        if parents.is_empty() {
            items = block.items.clone();
        } else {
            nodes.push(CssNode::Rule(CssRule {
                selectors: parents.to_vec(),
                items: block.items.clone(),
            }));
        }
    }

    let mut hoisted = Vec::new();
    let inner = Context {
        parents,
        condition: Some(&condition),
    };
    resolve_nodes(&block.children, &inner, &mut nodes, &mut hoisted);

    if !(items.is_empty() && nodes.is_empty()) {
        out.push(CssNode::AtRule(CssAtRule {
            name: condition.name,
            prelude: condition.prelude,
            body: CssAtRuleBody::Block { items, nodes },
        }));
    }
    out.append(&mut hoisted);
}

fn plain_at_rule(at_rule: &EvaluatedAtRule, body: CssAtRuleBody) -> CssNode {
    CssNode::AtRule(CssAtRule {
        name: at_rule.name.clone(),
        prelude: at_rule.prelude.clone(),
        body,
    })
}

/// Combine every child selector with every parent selector.
///
/// For each child, in order, each parent in order. A child referencing `&`
/// gets the parent spliced in place of every `&`, producing all combinations
/// when it appears more than once.
pub fn combine_selectors(parents: &[Selector], children: &[Selector]) -> Vec<Selector> {
    let mut out = Vec::new();
    for child in children {
        if child.has_parent_ref() {
            out.extend(splice_parents(parents, child));
        } else if parents.is_empty() {
            out.push(child.clone());
        } else {
            out.extend(parents.iter().map(|parent| descend(parent, child)));
        }
    }
    out
}

fn descend(parent: &Selector, child: &Selector) -> Selector {
    let mut elements = parent.elements.clone();
    for (i, element) in child.elements.iter().enumerate() {
        let combinator = match element.combinator {
            Combinator::None if i == 0 => Combinator::Descendant,
            other => other,
        };
        elements.push(SelectorElement::new(combinator, element.value.clone()));
    }
    Selector {
        elements,
        span: child.span,
    }
}

fn splice_parents(parents: &[Selector], child: &Selector) -> Vec<Selector> {
    let root = Selector {
        elements: Vec::new(),
        span: child.span,
    };
    let parents = if parents.is_empty() {
        std::slice::from_ref(&root)
    } else {
        parents
    };

    // Each partial selector with the index where the current compound starts
    let mut partials: Vec<(Vec<SelectorElement>, usize)> = vec![(Vec::new(), 0)];
    for element in &child.elements {
        let mut pieces = element.value.split('&');
        let head = pieces.next().unwrap_or_default();

        for (partial, start) in &mut partials {
            *start = partial.len();
            if !head.is_empty() {
                partial.push(SelectorElement::new(element.combinator, head));
            }
        }

        for tail in pieces {
            let mut next = Vec::with_capacity(partials.len() * parents.len());
            for (partial, start) in &partials {
                for parent in parents {
                    let mut partial = partial.clone();
                    append_parent(&mut partial, *start, element.combinator, parent);
                    if !tail.is_empty() {
                        glue(&mut partial, *start, element.combinator, tail);
                    }
                    next.push((partial, *start));
                }
            }
            partials = next;
        }
    }

    partials
        .into_iter()
        .map(|(elements, _)| Selector {
            elements,
            span: child.span,
        })
        .collect()
}

/// Append a parent's elements to a partial selector whose current compound
/// began at `start`
fn append_parent(
    partial: &mut Vec<SelectorElement>,
    start: usize,
    combinator: Combinator,
    parent: &Selector,
) {
    let mut elements = parent.elements.iter();
    if partial.len() > start {
        // `.x&`: the first parent compound attaches to the text before `&`
        if let (Some(first), Some(last)) = (elements.next(), partial.last_mut()) {
            last.value.push_str(&first.value);
        }
    } else if let Some(first) = elements.next() {
        let combinator = match combinator {
            Combinator::None => first.combinator,
            other => other,
        };
        partial.push(SelectorElement::new(combinator, first.value.clone()));
    }
    partial.extend(elements.cloned());
}

/// Attach text following `&` (`&:hover`, `&-suffix`)
fn glue(partial: &mut Vec<SelectorElement>, start: usize, combinator: Combinator, text: &str) {
    let attached = partial.len() > start;
    match partial.last_mut() {
        Some(last) if attached => last.value.push_str(text),
        _ => partial.push(SelectorElement::new(combinator, text)),
    }
}
