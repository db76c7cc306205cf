use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lessrs_parser::parse;

fn parse_simple_ruleset(c: &mut Criterion) {
    let source = r#"
        .button {
            padding: 8px 16px;
            background: #3366ff;
            border-radius: 4px;
        }
    "#;

    c.bench_function("parse_simple_ruleset", |b| b.iter(|| parse(black_box(source))));
}

fn parse_nested_stylesheet(c: &mut Criterion) {
    let source = r#"
        @primary: #3366ff;
        @spacing: 16px;

        .bordered(@width: 1px; @style: solid) {
            border: @width @style darken(@primary, 10%);
        }

        .card {
            padding: @spacing;
            .bordered(2px);

            .title {
                font: bold 24px/1.2 "Helvetica Neue", sans-serif;
                margin-bottom: (@spacing / 2);
            }

            &:hover {
                box-shadow: 0 4px 8px rgba(0, 0, 0, 0.15);
            }

            @media (max-width: 600px) {
                padding: (@spacing / 2);
            }
        }
    "#;

    c.bench_function("parse_nested_stylesheet", |b| {
        b.iter(|| parse(black_box(source)))
    });
}

fn parse_large_stylesheet(c: &mut Criterion) {
    let mut source = String::from("@base: 4px;\n");
    for i in 0..200 {
        source.push_str(&format!(
            ".item-{i} {{\n  margin: (@base * {i});\n  .child {{ color: #{:06x}; }}\n}}\n",
            i * 997
        ));
    }

    c.bench_function("parse_large_stylesheet", |b| {
        b.iter(|| parse(black_box(&source)))
    });
}

criterion_group!(
    benches,
    parse_simple_ruleset,
    parse_nested_stylesheet,
    parse_large_stylesheet
);
criterion_main!(benches);
