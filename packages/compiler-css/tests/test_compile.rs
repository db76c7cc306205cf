use lessrs_compiler_css::{compile, format_error, CompileError, CompileOptions, ErrorKind};
use std::thread;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn css(source: &str) -> String {
    init_tracing();
    compile(source, &CompileOptions::default()).unwrap()
}

fn error(source: &str) -> CompileError {
    init_tracing();
    compile(source, &CompileOptions::default()).unwrap_err()
}

/// Whitespace-insensitive form used to compare output modes
fn normalize(css: &str) -> String {
    css.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .replace(";}", "}")
}

const THEME: &str = r#"
// Theme
@base: 4px;
@accent: #336699;

.rounded(@radius: @base) {
    -webkit-border-radius: @radius;
    border-radius: @radius;
}

.card {
    padding: @base * 4;
    border: (@base / 4) solid @accent;
    outline-color: spin(@accent, 180);
    .rounded(@base * 2);

    .title {
        font: bold 16px/1.2 Georgia, serif;
        color: @accent;
    }

    &:hover,
    &.active {
        background: fade(@accent, 10%);
    }

    @media (max-width: 600px) {
        padding: @base;
    }
}
"#;

#[test]
fn test_source_order_preserved() {
    let out = css(".z { b: 2; a: 1; }\n.y { d: 4; c: 3; }\n.x { e: 5; }");
    assert_eq!(
        out,
        ".z {\n  b: 2;\n  a: 1;\n}\n.y {\n  d: 4;\n  c: 3;\n}\n.x {\n  e: 5;\n}\n"
    );
}

#[test]
fn test_valid_css_round_trip() {
    let source = r#"@charset "utf-8";
/* Site styles */
@import url("base.css");
html, body {
  margin: 0;
  font: 12px/1.5 "Helvetica Neue", Arial, sans-serif;
}
a:hover > span.icon ~ em {
  color: #FF0000;
  background: url(img/bg.png) no-repeat 0 0;
  filter: alpha(opacity=50);
}
.logo {
  background-image: url('images/logo (2x).png');
}
@media screen and (min-width: 768px) {
  .nav li + li {
    margin-left: -1px;
  }
}
@font-face {
  font-family: "Icons";
  src: url(icons.woff) format("woff");
  unicode-range: U+0025-00FF, U+4??;
}
"#;
    assert_eq!(css(source), source);
}

#[test]
fn test_slash_precedence() {
    let source = "@a: 10px;\n@b: 4px;\n.x { width: @a + @b / 2; height: @a * 2 / 4; font: 12px/1.5 serif; }";
    assert_eq!(
        css(source),
        ".x {\n  width: 12px;\n  height: 5px;\n  font: 12px/1.5 serif;\n}\n"
    );
}

#[test]
fn test_deep_nesting_is_reported() {
    let source = format!(".x {{ w: {}1{}; }}", "(".repeat(1000), ")".repeat(1000));
    let options = CompileOptions {
        silence_errors: true,
        ..CompileOptions::default()
    };
    let result = thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || {
            let err = compile(&source, &CompileOptions::default()).unwrap_err();
            let silenced = compile(&source, &options).unwrap();
            (err.kind, silenced == source)
        })
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(result, (ErrorKind::Parse, true));
}

#[test]
fn test_guarded_mixins() {
    let source = "\
.text(@bg) when (lightness(@bg) >= 50%) { color: black; }
.text(@bg) when (lightness(@bg) < 50%) { color: white; }
.text(@bg) { background: @bg; }
.a { .text(#eee); }
.b { .text(#111); }";
    assert_eq!(
        css(source),
        ".a {\n  color: black;\n  background: #eee;\n}\n.b {\n  color: white;\n  background: #111;\n}\n"
    );
}

#[test]
fn test_parenthesized_arithmetic_drops_no_unit() {
    assert_eq!(css(".a { width: (1 + 2); }"), ".a {\n  width: 3;\n}\n");
}

#[test]
fn test_nesting_resolves_to_descendant() {
    assert_eq!(css(".a { .b { color: red; } }"), ".a .b {\n  color: red;\n}\n");
}

#[test]
fn test_mixin_parameter_shadows_outer_variable() {
    let source = "@c: red;\n.m(@c) { color: @c; }\n.a { @c: blue; .m(@c); }";
    assert_eq!(css(source), ".a {\n  color: blue;\n}\n");
}

#[test]
fn test_mixin_sees_call_site_variables() {
    let source = "@c: red;\n.m() { color: @c; }\n.a { @c: blue; .m; }\n.b { .m; }";
    assert_eq!(
        css(source),
        ".a {\n  color: blue;\n}\n.b {\n  color: red;\n}\n"
    );
}

#[test]
fn test_recursion_guard() {
    let err = error(".again() { x: 1; .again; }\n.a { .again; }");
    assert_eq!(err.kind, ErrorKind::RecursionLimitExceeded);
    assert_eq!(err.position.line, 1);
}

#[test]
fn test_unit_mismatch() {
    let err = error(".a {\n  width: (1px + 1%);\n}");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert_eq!(err.position.line, 2);
    assert_eq!(err.excerpt, "width: (1px + 1%);");
}

#[test]
fn test_compact_and_expanded_agree() {
    // Computed colors shorten only in compact mode
    let source = THEME.replace("#336699", "#369").replace("spin(@accent, 180)", "fade(@accent, 50%)");
    let expanded = compile(&source, &CompileOptions::default()).unwrap();
    let compact = compile(&source, &CompileOptions::compressed()).unwrap();

    assert_ne!(expanded, compact);
    assert!(!compact.contains('\n'));
    assert_eq!(normalize(&expanded), normalize(&compact));
}

#[test]
fn test_theme_output() {
    let out = css(THEME);
    let expected = "\
.card {
  padding: 16px;
  border: 1px solid #336699;
  outline-color: #996633;
  -webkit-border-radius: 8px;
  border-radius: 8px;
}
.card .title {
  font: bold 16px/1.2 Georgia, serif;
  color: #336699;
}
.card:hover, .card.active {
  background: rgba(51, 102, 153, 0.1);
}
@media (max-width: 600px) {
  .card {
    padding: 4px;
  }
}
";
    assert_eq!(out, expected);
}

#[test]
fn test_lex_error_position() {
    let err = error(".a {\n  content: \"unterminated;\n}");
    assert_eq!(err.kind, ErrorKind::Lex);
    assert_eq!((err.position.line, err.position.column), (2, 12));
}

#[test]
fn test_parse_error_position() {
    let err = error(".a {\n  color red;\n}");
    assert_eq!(err.kind, ErrorKind::Parse);
    assert_eq!(err.position.line, 2);
    assert!(err.message.contains("expected"));
}

#[test]
fn test_root_declaration_is_rejected() {
    let err = error("color: red;");
    assert_eq!(err.kind, ErrorKind::Parse);
}

#[test]
fn test_resolution_errors() {
    assert_eq!(error(".a { color: @missing; }").kind, ErrorKind::Resolution);
    assert_eq!(error(".a { .missing(); }").kind, ErrorKind::Resolution);
    assert_eq!(error("@a: @b;\n@b: 2;").kind, ErrorKind::Resolution);
}

#[test]
fn test_silence_errors_returns_source() {
    init_tracing();
    let source = ".a { width: 1px + 1%; }";
    let options = CompileOptions {
        silence_errors: true,
        ..CompileOptions::default()
    };
    assert_eq!(compile(source, &options).unwrap(), source);
    assert!(compile(source, &CompileOptions::default()).is_err());
}

#[test]
fn test_options_from_json() {
    let options = CompileOptions::from_json(r#"{"compress": true}"#).unwrap();
    assert_eq!(compile(".a { color: red; }", &options).unwrap(), ".a{color:red}");
}

#[test]
fn test_format_error_report() {
    let source = ".a { color: @missing; }";
    let err = error(source);
    let report = format_error(&err, source, "main.less");
    assert!(report.contains("main.less"));
    assert!(report.contains("@missing"));
}

#[test]
fn test_parallel_compiles_are_independent() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let source = format!("@n: {i}px;\n.m(@x) {{ width: @x * 2; }}\n.t{i} {{ .m(@n); }}");
                compile(&source, &CompileOptions::compressed()).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let out = handle.join().unwrap();
        assert_eq!(out, format!(".t{}{{width:{}px}}", i, i * 2));
    }
}
