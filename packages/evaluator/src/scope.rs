//! Lexical scopes: variable bindings and visible mixins

use crate::value::Value;
use indexmap::IndexMap;
use lessrs_parser::ast::{Guard, MixinDef, Ruleset, StyleNode};

/// Something a mixin call can expand
#[derive(Debug, Clone, Copy)]
pub enum MixinCandidate<'a> {
    Def(&'a MixinDef),
    /// Plain rulesets with a simple class or id selector are callable too
    Ruleset(&'a Ruleset),
}

impl<'a> MixinCandidate<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            MixinCandidate::Def(def) => &def.name,
            MixinCandidate::Ruleset(ruleset) => ruleset.mixin_name().unwrap_or_default(),
        }
    }

    pub fn rules(&self) -> &'a [StyleNode] {
        match self {
            MixinCandidate::Def(def) => &def.rules,
            MixinCandidate::Ruleset(ruleset) => &ruleset.rules,
        }
    }

    pub fn guard(&self) -> Option<&'a Guard> {
        match self {
            MixinCandidate::Def(def) => def.guard.as_ref(),
            MixinCandidate::Ruleset(_) => None,
        }
    }
}

/// One level of the scope chain.
///
/// Bindings made here shadow the parent's without touching them. The parent
/// is borrowed, so a scope lives exactly as long as the evaluation of its
/// ruleset or mixin call.
#[derive(Debug, Default)]
pub struct Scope<'a> {
    vars: IndexMap<String, Value>,
    /// Variables defined later at this level
    pending: Vec<&'a str>,
    mixins: Vec<MixinCandidate<'a>>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(parent: &'a Scope<'a>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Record the mixins and pending variable names of a block about to be
    /// evaluated in this scope
    pub fn register(&mut self, rules: &'a [StyleNode]) {
        for node in rules {
            match node {
                StyleNode::MixinDef(def) => self.mixins.push(MixinCandidate::Def(def)),
                StyleNode::Ruleset(ruleset) if ruleset.mixin_name().is_some() => {
                    self.mixins.push(MixinCandidate::Ruleset(ruleset))
                }
                StyleNode::VariableDef(var) => self.pending.push(&var.name),
                _ => {}
            }
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.pending.retain(|pending| *pending != name);
        self.vars.insert(name.to_string(), value);
    }

    /// Innermost binding of `name`
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.vars.get(name) {
                return Some(value);
            }
            scope = current.parent;
        }
        None
    }

    /// Whether some enclosing level defines `name` further down
    pub fn is_pending(&self, name: &str) -> bool {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if current.pending.iter().any(|pending| *pending == name) {
                return true;
            }
            scope = current.parent;
        }
        false
    }

    /// Candidates named `name` from the innermost level that has any
    pub fn find_mixins(&self, name: &str) -> Vec<MixinCandidate<'a>> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            let found: Vec<_> = current
                .mixins
                .iter()
                .copied()
                .filter(|m| m.name() == name)
                .collect();
            if !found.is_empty() {
                return found;
            }
            scope = current.parent;
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessrs_parser::parse;

    #[test]
    fn test_child_shadows_without_mutating_parent() {
        let mut root = Scope::root();
        root.define("c", Value::keyword("red"));
        {
            let mut child = Scope::child(&root);
            child.define("c", Value::keyword("blue"));
            assert_eq!(child.lookup("c"), Some(&Value::keyword("blue")));
        }
        assert_eq!(root.lookup("c"), Some(&Value::keyword("red")));
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut root = Scope::root();
        root.define("a", Value::number(1.0, None));
        let child = Scope::child(&root);
        let grandchild = Scope::child(&child);
        assert_eq!(grandchild.lookup("a"), Some(&Value::number(1.0, None)));
        assert_eq!(grandchild.lookup("b"), None);
    }

    #[test]
    fn test_register_collects_mixins_and_pending_vars() {
        let sheet = parse(".m() { a: b }\n.plain { c: d }\n.x .y { e: f }\n@later: 1;").unwrap();
        let mut scope = Scope::root();
        scope.register(&sheet.rules);

        assert_eq!(scope.find_mixins(".m").len(), 1);
        assert_eq!(scope.find_mixins(".plain").len(), 1);
        assert!(scope.find_mixins(".x").is_empty());
        assert!(scope.is_pending("later"));

        scope.define("later", Value::number(1.0, None));
        assert!(!scope.is_pending("later"));
        assert_eq!(scope.lookup("later"), Some(&Value::number(1.0, None)));
    }

    #[test]
    fn test_innermost_mixins_win() {
        let outer = parse(".m() { a: 1 }").unwrap();
        let inner = parse(".m() { a: 2 }\n.m(@x) { a: @x }").unwrap();
        let mut root = Scope::root();
        root.register(&outer.rules);
        let mut child = Scope::child(&root);
        child.register(&inner.rules);
        assert_eq!(child.find_mixins(".m").len(), 2);
    }
}
