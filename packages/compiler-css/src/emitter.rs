//! CSS text generation
//!
//! Expanded output puts every declaration on its own line, indented two
//! spaces per nesting level:
//!
//! ```text
//! .a {
//!   color: red;
//! }
//! ```
//!
//! Compact output drops every optional byte: `.a{color:red;margin:0}`.

use lessrs_evaluator::{BodyItem, CssAtRule, CssAtRuleBody, CssNode, CssRule, ResolvedStylesheet};
use lessrs_parser::ast::Selector;
use tracing::{debug, instrument};

/// Selector lists longer than this go one selector per line
const INLINE_SELECTOR_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    pub compress: bool,
    pub strip_comments: bool,
}

/// Render a resolved stylesheet as CSS text
#[instrument(skip(sheet), fields(nodes = sheet.nodes.len()))]
pub fn emit(sheet: &ResolvedStylesheet, options: &EmitOptions) -> String {
    let mut emitter = Emitter {
        out: String::new(),
        compress: options.compress,
        comments: !(options.compress || options.strip_comments),
    };
    emitter.nodes(&sheet.nodes, 0);
    debug!(bytes = emitter.out.len(), "Emitted CSS");
    emitter.out
}

struct Emitter {
    out: String,
    compress: bool,
    comments: bool,
}

impl Emitter {
    fn nodes(&mut self, nodes: &[CssNode], depth: usize) {
        for node in nodes {
            match node {
                CssNode::Rule(rule) => self.rule(rule, depth),
                CssNode::AtRule(at_rule) => self.at_rule(at_rule, depth),
                CssNode::Comment(text) => {
                    if self.comments {
                        self.indent(depth);
                        self.out.push_str(text);
                        self.out.push('\n');
                    }
                }
            }
        }
    }

    fn rule(&mut self, rule: &CssRule, depth: usize) {
        self.indent(depth);
        self.selectors(&rule.selectors, depth);
        self.open();
        self.items(&rule.items, depth + 1);
        self.close(depth);
    }

    fn at_rule(&mut self, at_rule: &CssAtRule, depth: usize) {
        self.indent(depth);
        self.out.push('@');
        self.out.push_str(&at_rule.name);
        if !at_rule.prelude.is_empty() {
            self.out.push(' ');
            self.out.push_str(&at_rule.prelude);
        }

        match &at_rule.body {
            CssAtRuleBody::Statement => {
                self.out.push(';');
                if !self.compress {
                    self.out.push('\n');
                }
            }
            CssAtRuleBody::Raw(raw) => {
                self.open();
                if !raw.is_empty() {
                    self.indent(depth + 1);
                    self.out.push_str(raw);
                    if !self.compress {
                        self.out.push('\n');
                    }
                }
                self.close(depth);
            }
            CssAtRuleBody::Block { items, nodes } => {
                self.open();
                if self.items(items, depth + 1) && self.compress && !nodes.is_empty() {
                    self.out.push(';');
                }
                self.nodes(nodes, depth + 1);
                self.close(depth);
            }
        }
    }

    fn selectors(&mut self, selectors: &[Selector], depth: usize) {
        let separator = if self.compress {
            ",".to_string()
        } else if selectors.len() > INLINE_SELECTOR_LIMIT {
            format!(",\n{}", "  ".repeat(depth))
        } else {
            ", ".to_string()
        };
        let text = selectors
            .iter()
            .map(|selector| selector.to_css(self.compress))
            .collect::<Vec<_>>()
            .join(&separator);
        self.out.push_str(&text);
    }

    /// Whether any declaration was written
    fn items(&mut self, items: &[BodyItem], depth: usize) -> bool {
        let mut first = true;
        for item in items {
            match item {
                BodyItem::Declaration(decl) => {
                    if self.compress {
                        if !first {
                            self.out.push(';');
                        }
                        self.out.push_str(&decl.property);
                        self.out.push(':');
                        self.out.push_str(&decl.value.to_css(true));
                        if decl.important {
                            self.out.push_str("!important");
                        }
                    } else {
                        self.indent(depth);
                        self.out.push_str(&decl.property);
                        self.out.push_str(": ");
                        self.out.push_str(&decl.value.to_css(false));
                        if decl.important {
                            self.out.push_str(" !important");
                        }
                        self.out.push_str(";\n");
                    }
                    first = false;
                }
                BodyItem::Comment(text) => {
                    if self.comments {
                        self.indent(depth);
                        self.out.push_str(text);
                        self.out.push('\n');
                    }
                }
            }
        }
        !first
    }

    fn open(&mut self) {
        self.out.push_str(if self.compress { "{" } else { " {\n" });
    }

    fn close(&mut self, depth: usize) {
        if self.compress {
            self.out.push('}');
        } else {
            self.indent(depth);
            self.out.push_str("}\n");
        }
    }

    fn indent(&mut self, depth: usize) {
        if !self.compress {
            for _ in 0..depth {
                self.out.push_str("  ");
            }
        }
    }
}
