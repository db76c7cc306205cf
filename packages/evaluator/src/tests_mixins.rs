/// Mixin definition, matching and expansion
use crate::*;
use lessrs_parser::parse;

/// Flattened `selector { property: value }` lines for quick comparison
fn flatten(source: &str) -> Vec<String> {
    let sheet = parse(source).unwrap();
    let evaluated = Evaluator::new().evaluate(&sheet).unwrap();
    resolve(&evaluated)
        .nodes
        .iter()
        .filter_map(|node| match node {
            CssNode::Rule(rule) => Some(rule),
            _ => None,
        })
        .map(|rule| {
            let selectors: Vec<String> = rule.selectors.iter().map(|s| s.to_css(false)).collect();
            let decls: Vec<String> = rule
                .items
                .iter()
                .filter_map(|item| match item {
                    BodyItem::Declaration(d) => Some(format!(
                        "{}: {}{}",
                        d.property,
                        d.value.to_css(false),
                        if d.important { " !important" } else { "" }
                    )),
                    BodyItem::Comment(_) => None,
                })
                .collect();
            format!("{} {{ {} }}", selectors.join(", "), decls.join("; "))
        })
        .collect()
}

fn eval_error(source: &str) -> EvalError {
    let sheet = parse(source).unwrap();
    Evaluator::new().evaluate(&sheet).unwrap_err()
}

#[test]
fn test_parameterless_mixin() {
    let rules = flatten(".bordered() { border: 1px solid; }\n.a { .bordered; color: red; }");
    assert_eq!(rules, vec![".a { border: 1px solid; color: red }"]);
}

#[test]
fn test_mixin_definition_produces_no_output() {
    let rules = flatten(".m(@x) { width: @x; }");
    assert!(rules.is_empty());
}

#[test]
fn test_plain_ruleset_as_mixin() {
    let rules = flatten(".base { color: red; }\n.a { .base; }");
    assert_eq!(rules, vec![".base { color: red }", ".a { color: red }"]);
}

#[test]
fn test_mixin_called_before_definition() {
    let rules = flatten(".a { .m(2px); }\n.m(@w) { width: @w; }");
    assert_eq!(rules, vec![".a { width: 2px }"]);
}

#[test]
fn test_parameter_shadows_global() {
    let rules = flatten("@x: 1px;\n.m(@x) { width: @x; }\n.a { .m(5px); height: @x; }");
    assert_eq!(rules, vec![".a { width: 5px; height: 1px }"]);
}

#[test]
fn test_default_parameters() {
    let rules = flatten(".m(@a: 1px; @b: @a * 2) { x: @a; y: @b; }\n.a { .m; }\n.b { .m(3px); }");
    assert_eq!(rules, vec![".a { x: 1px; y: 2px }", ".b { x: 3px; y: 6px }"]);
}

#[test]
fn test_named_arguments() {
    let rules = flatten(".m(@a: 1; @b: 2) { x: @a @b; }\n.a { .m(@b: 5); }");
    assert_eq!(rules, vec![".a { x: 1 5 }"]);
}

#[test]
fn test_arguments_variable() {
    let rules = flatten(".shadow(@x; @y; @c: black) { box-shadow: @arguments; }\n.a { .shadow(1px; 2px); }");
    assert_eq!(rules, vec![".a { box-shadow: 1px 2px black }"]);
}

#[test]
fn test_variadic_rest() {
    let rules = flatten(".m(@first; @rest...) { a: @first; b: @rest; }\n.a { .m(1; 2; 3); }");
    assert_eq!(rules, vec![".a { a: 1; b: 2 3 }"]);
}

#[test]
fn test_pattern_matching_selects_overload() {
    let source = ".m(dark; @c) { color: darken(@c, 10%); }\n.m(light; @c) { color: lighten(@c, 10%); }\n.a { .m(light; #000); }";
    let rules = flatten(source);
    assert_eq!(rules, vec![".a { color: #1a1a1a }"]);
}

#[test]
fn test_all_matching_overloads_expand() {
    let source = ".m(@a) { x: @a; }\n.m(@a; @b: 2) { y: @b; }\n.a { .m(1); }";
    assert_eq!(flatten(source), vec![".a { x: 1; y: 2 }"]);
}

#[test]
fn test_mixin_body_forward_reference() {
    let rules = flatten(".m() { width: @w; @w: @base * 2; @base: 4px; }\n.a { .m; }");
    assert_eq!(rules, vec![".a { width: 8px }"]);
}

#[test]
fn test_nested_rulesets_in_mixin_attach_to_call_site() {
    let rules = flatten(".m() { .inner { color: red; } }\n.a { .m; }");
    assert_eq!(rules, vec![".a .inner { color: red }"]);
}

#[test]
fn test_important_call_marks_declarations() {
    let rules = flatten(".m() { color: red; }\n.a { .m !important; }");
    assert_eq!(rules, vec![".a { color: red !important }"]);
}

#[test]
fn test_namespaced_mixin() {
    let rules = flatten("#ns { .m() { color: blue; } }\n.a { #ns > .m; }");
    assert_eq!(rules, vec![".a { color: blue }"]);
}

#[test]
fn test_undefined_mixin() {
    match eval_error(".a { .missing; }") {
        EvalError::UndefinedMixin { name, .. } => assert_eq!(name, ".missing"),
        other => panic!("Expected UndefinedMixin, got {:?}", other),
    }
}

#[test]
fn test_no_matching_mixin() {
    let err = eval_error(".m(@a; @b) { x: @a; }\n.a { .m(1); }");
    assert!(matches!(err, EvalError::NoMatchingMixin { args: 1, .. }));
}

#[test]
fn test_surplus_arguments_are_ignored() {
    let source = ".m(@a) { x: @a; y: @arguments; }\n.b { .m(1, 2); }";
    assert_eq!(flatten(source), vec![".b { x: 1; y: 1 2 }"]);
}

#[test]
fn test_guards_select_overloads() {
    let source = "\
.m(@a) when (lightness(@a) >= 50%) { color: black; }
.m(@a) when (lightness(@a) < 50%) { color: white; }
.m(@a) { background: @a; }
.light { .m(#ddd); }
.dark { .m(#222); }";
    assert_eq!(
        flatten(source),
        vec![
            ".light { color: black; background: #ddd }",
            ".dark { color: white; background: #222 }",
        ]
    );
}

#[test]
fn test_guard_alternatives_and_negation() {
    let source = "\
.m(@a; @b) when (@a = @b), (@a > 10) { x: @a; }
.n(@c) when not (iscolor(@c)) and (iskeyword(@c)) { y: @c; }
.a { .m(1; 1); .m(11; 2); .m(3; 2); .n(red); .n(solid); .n(10px); }";
    assert_eq!(flatten(source), vec![".a { x: 1; x: 11; y: solid }"]);
}

#[test]
fn test_failed_guard_is_not_an_error() {
    let source = ".m(@a) when (@a) { x: 1; }\n.a { .m(false); y: 2; }";
    assert_eq!(flatten(source), vec![".a { y: 2 }"]);
}

#[test]
fn test_recursion_limit() {
    let err = eval_error(".loop() { .loop; }\n.a { .loop; }");
    match err {
        EvalError::RecursionLimitExceeded { name, limit, .. } => {
            assert_eq!(name, ".loop");
            assert_eq!(limit, MAX_MIXIN_DEPTH);
        }
        other => panic!("Expected RecursionLimitExceeded, got {:?}", other),
    }
}

#[test]
fn test_evaluator_is_reusable_after_error() {
    let mut evaluator = Evaluator::new();
    let bad = parse(".loop() { .loop; }\n.a { .loop; }").unwrap();
    assert!(evaluator.evaluate(&bad).is_err());

    let good = parse(".m() { x: 1; }\n.a { .m; }").unwrap();
    assert!(evaluator.evaluate(&good).is_ok());
}
