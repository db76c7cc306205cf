/// Tests for variables, operators, interpolation and built-in functions
use crate::*;
use lessrs_parser::parse;

/// `property: value` pairs of the first ruleset
fn declarations(source: &str) -> Vec<(String, String)> {
    let sheet = parse(source).unwrap();
    let evaluated = Evaluator::new().evaluate(&sheet).unwrap();
    match &evaluated.nodes[0] {
        EvaluatedNode::Ruleset(ruleset) => ruleset
            .body
            .items
            .iter()
            .filter_map(|item| match item {
                BodyItem::Declaration(decl) => {
                    Some((decl.property.clone(), decl.value.to_css(false)))
                }
                BodyItem::Comment(_) => None,
            })
            .collect(),
        other => panic!("Expected ruleset, got {:?}", other),
    }
}

fn value_of(source: &str) -> String {
    declarations(source).remove(0).1
}

fn eval_error(source: &str) -> EvalError {
    let sheet = parse(source).unwrap();
    Evaluator::new().evaluate(&sheet).unwrap_err()
}

#[test]
fn test_parenthesized_arithmetic() {
    assert_eq!(value_of(".a { width: (1 + 2); }"), "3");
    assert_eq!(value_of(".a { width: (10px / 4); }"), "2.5px");
    assert_eq!(value_of(".a { width: 2 * 3 + 1; }"), "7");
}

#[test]
fn test_slash_outside_parens_is_kept() {
    assert_eq!(value_of(".a { font: 12px/1.5 sans-serif; }"), "12px/1.5 sans-serif");
}

#[test]
fn test_slash_divides_inside_arithmetic() {
    assert_eq!(value_of("@a: 10px; @b: 4px; .x { width: @a + @b / 2; }"), "12px");
    assert_eq!(value_of("@a: 10px; .x { width: @a * 2 / 4; }"), "5px");
    assert_eq!(
        value_of("@lh: 1.5; .x { font: 14px/@lh serif; }"),
        "14px/1.5 serif"
    );
}

#[test]
fn test_legacy_css_values_kept() {
    assert_eq!(value_of("@o: 40; .x { filter: alpha(opacity=@o); }"), "alpha(opacity=40)");
    assert_eq!(
        value_of(".x { unicode-range: U+0025-00FF, U+4??; }"),
        "U+0025-00FF, U+4??"
    );
}

#[test]
fn test_urls() {
    assert_eq!(
        value_of("@base: \"/img\"; .x { background: url(\"@{base}/a.png\"); }"),
        "url(\"/img/a.png\")"
    );
    assert_eq!(
        value_of("@icon: 'i.svg'; .x { background: url(@icon); }"),
        "url('i.svg')"
    );
    assert_eq!(
        value_of(".x { background: url(http://x.org/a.png?v=1); }"),
        "url(http://x.org/a.png?v=1)"
    );
}

#[test]
fn test_unit_adoption() {
    assert_eq!(value_of("@w: 10px; .a { width: @w * 2; }"), "20px");
    assert_eq!(value_of(".a { width: 2 + 3em; }"), "5em");
}

#[test]
fn test_incompatible_units() {
    let err = eval_error(".a { width: 1px + 1%; }");
    assert!(matches!(err, EvalError::TypeMismatch { .. }));
}

#[test]
fn test_division_by_zero() {
    let err = eval_error(".a { width: (1px / 0); }");
    assert!(matches!(err, EvalError::DivisionByZero { .. }));
}

#[test]
fn test_color_arithmetic() {
    assert_eq!(value_of(".a { color: #111 + #222; }"), "#333333");
    assert_eq!(value_of(".a { color: #fff - #010101; }"), "#fefefe");
    assert_eq!(value_of(".a { color: 2 * #101010; }"), "#202020");
}

#[test]
fn test_number_minus_color_is_rejected() {
    let err = eval_error(".a { color: 10 - #fff; }");
    assert!(matches!(err, EvalError::TypeMismatch { .. }));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(value_of(r#".a { content: "a" + "b"; }"#), "\"ab\"");
}

#[test]
fn test_string_interpolation_and_escape() {
    let source = r#"@name: "world"; .a { content: "hello @{name}"; filter: ~"ms:alwaysHasItsOwnSyntax"; }"#;
    let decls = declarations(source);
    assert_eq!(decls[0].1, "\"hello world\"");
    assert_eq!(decls[1].1, "ms:alwaysHasItsOwnSyntax");
}

#[test]
fn test_property_interpolation() {
    let decls = declarations("@side: left; .a { margin-@{side}: 0; }");
    assert_eq!(decls[0].0, "margin-left");
}

#[test]
fn test_variable_variables() {
    assert_eq!(
        value_of(r#"@primary: red; @which: "primary"; .a { color: @@which; }"#),
        "red"
    );
}

#[test]
fn test_unresolved_variable() {
    let err = eval_error(".a { color: @nope; }");
    match err {
        EvalError::UnresolvedVariable { name, .. } => assert_eq!(name, "nope"),
        other => panic!("Expected UnresolvedVariable, got {:?}", other),
    }
}

#[test]
fn test_use_before_definition() {
    let err = eval_error("@a: @b;\n@b: 1;");
    assert!(matches!(err, EvalError::UseBeforeDefinition { .. }));
    assert!(err.is_resolution_error());
}

#[test]
fn test_redefinition_does_not_affect_earlier_declarations() {
    let decls = declarations("@c: red;\n.a { x: @c; @c: blue; y: @c; }");
    assert_eq!(decls[0].1, "red");
    assert_eq!(decls[1].1, "blue");
}

#[test]
fn test_inner_scope_shadows_outer() {
    let source = "@c: red;\n.a { @c: blue; .b { color: @c; } }\n.d { color: @c; }";
    let sheet = parse(source).unwrap();
    let evaluated = Evaluator::new().evaluate(&sheet).unwrap();
    let css = resolve(&evaluated);
    let values: Vec<String> = css
        .nodes
        .iter()
        .filter_map(|node| match node {
            CssNode::Rule(rule) => match &rule.items[0] {
                BodyItem::Declaration(decl) => Some(decl.value.to_css(false)),
                _ => None,
            },
            _ => None,
        })
        .collect();
    assert_eq!(values, vec!["blue", "red"]);
}

#[test]
fn test_color_functions() {
    let decls = declarations(
        ".a { a: lighten(#000, 50%); b: darken(#fff, 100%); c: fade(#000, 50%); d: spin(#f00, 120); }",
    );
    assert_eq!(decls[0].1, "#808080");
    assert_eq!(decls[1].1, "#000000");
    assert_eq!(decls[2].1, "rgba(0, 0, 0, 0.5)");
    assert_eq!(decls[3].1, "#00ff00");
}

#[test]
fn test_math_functions() {
    let decls = declarations(".a { a: round(1.67); b: percentage(0.5); c: ceil(2.1px); d: floor(2.9); }");
    let values: Vec<&str> = decls.iter().map(|(_, v)| v.as_str()).collect();
    assert_eq!(values, vec!["2", "50%", "3px", "2"]);
}

#[test]
fn test_unknown_function_passes_through() {
    assert_eq!(
        value_of("@x: 5px; .a { transform: translate(@x, 10px); }"),
        "translate(5px, 10px)"
    );
}

#[test]
fn test_calc_arguments_are_not_evaluated() {
    assert_eq!(
        value_of("@gap: 10px; .a { width: calc(100% - @gap); }"),
        "calc(100% - 10px)"
    );
}

#[test]
fn test_important_flag_kept() {
    let sheet = parse(".a { color: red !important; }").unwrap();
    let evaluated = Evaluator::new().evaluate(&sheet).unwrap();
    let EvaluatedNode::Ruleset(ruleset) = &evaluated.nodes[0] else {
        panic!("Expected ruleset");
    };
    let BodyItem::Declaration(decl) = &ruleset.body.items[0] else {
        panic!("Expected declaration");
    };
    assert!(decl.important);
}
