use lessrs_parser::ast::*;

/// Visitor pattern for traversing the stylesheet AST immutably
///
/// The default implementations walk the entire tree. Override specific
/// visit_* methods to act on nodes, calling the matching walk_* function to
/// keep descending.
pub trait Visitor: Sized {
    fn visit_stylesheet(&mut self, sheet: &Stylesheet) {
        walk_rules(self, &sheet.rules);
    }

    fn visit_ruleset(&mut self, ruleset: &Ruleset) {
        walk_rules(self, &ruleset.rules);
    }

    fn visit_declaration(&mut self, decl: &Declaration) {
        self.visit_expression(&decl.value);
    }

    fn visit_variable_def(&mut self, var: &VariableDef) {
        self.visit_expression(&var.value);
    }

    fn visit_mixin_def(&mut self, mixin: &MixinDef) {
        walk_mixin_def(self, mixin);
    }

    fn visit_mixin_call(&mut self, call: &MixinCall) {
        for arg in &call.args {
            self.visit_expression(&arg.value);
        }
    }

    fn visit_at_rule(&mut self, at_rule: &AtRule) {
        if let AtRuleBody::Rules(rules) = &at_rule.body {
            walk_rules(self, rules);
        }
    }

    fn visit_comment(&mut self, _comment: &Comment) {
        // Leaf node, no children to walk
    }

    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr);
    }
}

/// Mutable visitor pattern for transforming the stylesheet AST
///
/// Works on whole rule lists so implementations can drop or insert nodes.
pub trait VisitorMut: Sized {
    fn visit_stylesheet_mut(&mut self, sheet: &mut Stylesheet) {
        self.visit_rules_mut(&mut sheet.rules);
    }

    fn visit_rules_mut(&mut self, rules: &mut Vec<StyleNode>) {
        walk_rules_mut(self, rules);
    }

    fn visit_expression_mut(&mut self, expr: &mut Expression) {
        walk_expression_mut(self, expr);
    }
}

// Default walk implementations for immutable visitor

pub fn walk_rules<V: Visitor>(visitor: &mut V, rules: &[StyleNode]) {
    for node in rules {
        match node {
            StyleNode::Ruleset(ruleset) => visitor.visit_ruleset(ruleset),
            StyleNode::Declaration(decl) => visitor.visit_declaration(decl),
            StyleNode::VariableDef(var) => visitor.visit_variable_def(var),
            StyleNode::MixinDef(mixin) => visitor.visit_mixin_def(mixin),
            StyleNode::MixinCall(call) => visitor.visit_mixin_call(call),
            StyleNode::AtRule(at_rule) => visitor.visit_at_rule(at_rule),
            StyleNode::Comment(comment) => visitor.visit_comment(comment),
        }
    }
}

pub fn walk_mixin_def<V: Visitor>(visitor: &mut V, mixin: &MixinDef) {
    for param in &mixin.params {
        match param {
            MixinParam::Named {
                default: Some(expr),
                ..
            }
            | MixinParam::Pattern(expr) => visitor.visit_expression(expr),
            MixinParam::Named { default: None, .. } | MixinParam::Variadic { .. } => {}
        }
    }
    if let Some(guard) = &mixin.guard {
        for condition in guard.alternatives.iter().flatten() {
            visitor.visit_expression(&condition.left);
            if let Some((_, right)) = &condition.comparison {
                visitor.visit_expression(right);
            }
        }
    }
    walk_rules(visitor, &mixin.rules);
}

pub fn walk_expression<V: Visitor>(visitor: &mut V, expr: &Expression) {
    match expr {
        Expression::Number { .. }
        | Expression::Color { .. }
        | Expression::String { .. }
        | Expression::Keyword { .. }
        | Expression::Url { .. }
        | Expression::Variable { .. }
        | Expression::VariableVariable { .. } => {
            // Leaf nodes
        }
        Expression::Binary { left, right, .. } | Expression::Slash { left, right, .. } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
        Expression::Negate { operand, .. } => visitor.visit_expression(operand),
        Expression::Alpha { value, .. } => visitor.visit_expression(value),
        Expression::Paren { inner, .. } => visitor.visit_expression(inner),
        Expression::Call { args, .. } => {
            for arg in args {
                visitor.visit_expression(arg);
            }
        }
        Expression::List { items, .. } => {
            for item in items {
                visitor.visit_expression(item);
            }
        }
    }
}

// Default walk implementations for mutable visitor

pub fn walk_rules_mut<V: VisitorMut>(visitor: &mut V, rules: &mut Vec<StyleNode>) {
    for node in rules.iter_mut() {
        match node {
            StyleNode::Ruleset(ruleset) => visitor.visit_rules_mut(&mut ruleset.rules),
            StyleNode::MixinDef(mixin) => {
                for param in &mut mixin.params {
                    match param {
                        MixinParam::Named {
                            default: Some(expr),
                            ..
                        }
                        | MixinParam::Pattern(expr) => visitor.visit_expression_mut(expr),
                        _ => {}
                    }
                }
                if let Some(guard) = &mut mixin.guard {
                    for condition in guard.alternatives.iter_mut().flatten() {
                        visitor.visit_expression_mut(&mut condition.left);
                        if let Some((_, right)) = &mut condition.comparison {
                            visitor.visit_expression_mut(right);
                        }
                    }
                }
                visitor.visit_rules_mut(&mut mixin.rules);
            }
            StyleNode::AtRule(at_rule) => {
                if let AtRuleBody::Rules(rules) = &mut at_rule.body {
                    visitor.visit_rules_mut(rules);
                }
            }
            StyleNode::Declaration(decl) => visitor.visit_expression_mut(&mut decl.value),
            StyleNode::VariableDef(var) => visitor.visit_expression_mut(&mut var.value),
            StyleNode::MixinCall(call) => {
                for arg in &mut call.args {
                    visitor.visit_expression_mut(&mut arg.value);
                }
            }
            StyleNode::Comment(_) => {}
        }
    }
}

pub fn walk_expression_mut<V: VisitorMut>(visitor: &mut V, expr: &mut Expression) {
    match expr {
        Expression::Binary { left, right, .. } | Expression::Slash { left, right, .. } => {
            visitor.visit_expression_mut(left);
            visitor.visit_expression_mut(right);
        }
        Expression::Negate { operand, .. } => visitor.visit_expression_mut(operand),
        Expression::Alpha { value, .. } => visitor.visit_expression_mut(value),
        Expression::Paren { inner, .. } => visitor.visit_expression_mut(inner),
        Expression::Call { args, .. } => {
            for arg in args {
                visitor.visit_expression_mut(arg);
            }
        }
        Expression::List { items, .. } => {
            for item in items {
                visitor.visit_expression_mut(item);
            }
        }
        _ => {}
    }
}

/// Removes every comment from a stylesheet
#[derive(Debug, Default)]
pub struct CommentStripper {
    pub removed: usize,
}

impl VisitorMut for CommentStripper {
    fn visit_rules_mut(&mut self, rules: &mut Vec<StyleNode>) {
        let before = rules.len();
        rules.retain(|node| !matches!(node, StyleNode::Comment(_)));
        self.removed += before - rules.len();
        walk_rules_mut(self, rules);
    }
}

/// Node counts of a parsed stylesheet
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StylesheetStats {
    pub rulesets: usize,
    pub declarations: usize,
    pub variables: usize,
    pub mixin_defs: usize,
    pub mixin_calls: usize,
    pub at_rules: usize,
    pub comments: usize,
}

impl StylesheetStats {
    pub fn collect(sheet: &Stylesheet) -> Self {
        let mut stats = Self::default();
        stats.visit_stylesheet(sheet);
        stats
    }
}

impl Visitor for StylesheetStats {
    fn visit_ruleset(&mut self, ruleset: &Ruleset) {
        self.rulesets += 1;
        walk_rules(self, &ruleset.rules);
    }

    fn visit_declaration(&mut self, _decl: &Declaration) {
        self.declarations += 1;
    }

    fn visit_variable_def(&mut self, _var: &VariableDef) {
        self.variables += 1;
    }

    fn visit_mixin_def(&mut self, mixin: &MixinDef) {
        self.mixin_defs += 1;
        walk_mixin_def(self, mixin);
    }

    fn visit_mixin_call(&mut self, _call: &MixinCall) {
        self.mixin_calls += 1;
    }

    fn visit_at_rule(&mut self, at_rule: &AtRule) {
        self.at_rules += 1;
        if let AtRuleBody::Rules(rules) = &at_rule.body {
            walk_rules(self, rules);
        }
    }

    fn visit_comment(&mut self, _comment: &Comment) {
        self.comments += 1;
    }
}
