/// Selector combination and at-rule bubbling
use crate::*;
use lessrs_parser::ast::{Combinator, Selector, SelectorElement, Span};
use lessrs_parser::parse;

fn selector(parts: &[(Combinator, &str)]) -> Selector {
    Selector {
        elements: parts
            .iter()
            .map(|(combinator, value)| SelectorElement::new(*combinator, *value))
            .collect(),
        span: Span::default(),
    }
}

fn simple(value: &str) -> Selector {
    selector(&[(Combinator::None, value)])
}

fn css(selectors: &[Selector]) -> Vec<String> {
    selectors.iter().map(|s| s.to_css(false)).collect()
}

fn resolved(source: &str) -> ResolvedStylesheet {
    let sheet = parse(source).unwrap();
    resolve(&Evaluator::new().evaluate(&sheet).unwrap())
}

fn rule_selectors(node: &CssNode) -> Vec<String> {
    match node {
        CssNode::Rule(rule) => css(&rule.selectors),
        other => panic!("Expected rule, got {:?}", other),
    }
}

#[test]
fn test_descendant_by_default() {
    let combined = combine_selectors(&[simple(".a")], &[simple(".b")]);
    assert_eq!(css(&combined), vec![".a .b"]);
}

#[test]
fn test_child_keeps_its_combinator() {
    let child = selector(&[(Combinator::Child, ".b")]);
    let combined = combine_selectors(&[simple(".a")], &[child]);
    assert_eq!(css(&combined), vec![".a > .b"]);
}

#[test]
fn test_every_parent_with_every_child() {
    let combined = combine_selectors(&[simple(".a"), simple(".b")], &[simple(".x"), simple(".y")]);
    assert_eq!(css(&combined), vec![".a .x", ".b .x", ".a .y", ".b .y"]);
}

#[test]
fn test_parent_reference_suffix() {
    let combined = combine_selectors(&[simple(".btn")], &[simple("&:hover"), simple("&-primary")]);
    assert_eq!(css(&combined), vec![".btn:hover", ".btn-primary"]);
}

#[test]
fn test_parent_reference_after_compound() {
    let child = selector(&[(Combinator::None, ".theme"), (Combinator::Descendant, "&")]);
    let combined = combine_selectors(&[simple(".a")], &[child]);
    assert_eq!(css(&combined), vec![".theme .a"]);
}

#[test]
fn test_repeated_parent_reference_yields_all_combinations() {
    let child = selector(&[(Combinator::None, "&"), (Combinator::Adjacent, "&")]);
    let combined = combine_selectors(&[simple(".a"), simple(".b")], &[child]);
    assert_eq!(css(&combined), vec![".a + .a", ".a + .b", ".b + .a", ".b + .b"]);
}

#[test]
fn test_multi_element_parent_is_spliced_whole() {
    let parent = selector(&[(Combinator::None, ".a"), (Combinator::Descendant, ".b")]);
    let combined = combine_selectors(&[parent], &[simple("&.c")]);
    assert_eq!(css(&combined), vec![".a .b.c"]);
}

#[test]
fn test_nested_rules_flatten_in_order() {
    let out = resolved(".a { color: red; .b { color: blue; } margin: 0; }\n.c { x: 1; }");
    assert_eq!(out.nodes.len(), 3);
    assert_eq!(rule_selectors(&out.nodes[0]), vec![".a"]);
    assert_eq!(rule_selectors(&out.nodes[1]), vec![".a .b"]);
    assert_eq!(rule_selectors(&out.nodes[2]), vec![".c"]);
    let CssNode::Rule(rule) = &out.nodes[0] else {
        unreachable!()
    };
    assert_eq!(rule.items.len(), 2);
}

#[test]
fn test_empty_rulesets_skipped_but_children_kept() {
    let out = resolved(".a { .b { color: red; } }");
    assert_eq!(out.nodes.len(), 1);
    assert_eq!(rule_selectors(&out.nodes[0]), vec![".a .b"]);
}

#[test]
fn test_media_bubbles_out_of_ruleset() {
    let out = resolved(".a { color: red; @media print { color: black; } }");
    assert_eq!(out.nodes.len(), 2);
    assert_eq!(rule_selectors(&out.nodes[0]), vec![".a"]);
    match &out.nodes[1] {
        CssNode::AtRule(at_rule) => {
            assert_eq!(at_rule.name, "media");
            assert_eq!(at_rule.prelude, "print");
            let CssAtRuleBody::Block { items, nodes } = &at_rule.body else {
                panic!("Expected block body");
            };
            assert!(items.is_empty());
            assert_eq!(rule_selectors(&nodes[0]), vec![".a"]);
        }
        other => panic!("Expected at-rule, got {:?}", other),
    }
}

#[test]
fn test_nested_media_preludes_join_with_and() {
    let out = resolved("@media screen { .a { @media (min-width: 768px) { color: red; } } }");
    let preludes: Vec<&str> = out
        .nodes
        .iter()
        .filter_map(|node| match node {
            CssNode::AtRule(at_rule) => Some(at_rule.prelude.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(preludes, vec!["screen and (min-width: 768px)"]);
}

#[test]
fn test_keyframes_do_not_inherit_selectors() {
    let out = resolved("@keyframes spin { from { a: 0; } to { a: 1; } }");
    let CssNode::AtRule(at_rule) = &out.nodes[0] else {
        panic!("Expected at-rule");
    };
    let CssAtRuleBody::Block { nodes, .. } = &at_rule.body else {
        panic!("Expected block body");
    };
    assert_eq!(rule_selectors(&nodes[0]), vec!["from"]);
    assert_eq!(rule_selectors(&nodes[1]), vec!["to"]);
}

#[test]
fn test_statement_at_rules_pass_through() {
    let out = resolved("@charset \"utf-8\";\n@import url(\"a.css\");");
    assert_eq!(out.nodes.len(), 2);
    assert!(matches!(
        &out.nodes[0],
        CssNode::AtRule(CssAtRule {
            body: CssAtRuleBody::Statement,
            ..
        })
    ));
}
