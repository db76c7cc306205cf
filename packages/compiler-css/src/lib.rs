//! LESS to CSS compiler
//!
//! ```
//! use lessrs_compiler_css::{compile, CompileOptions};
//!
//! let css = compile("@c: red;\n.a { .b { color: @c; } }", &CompileOptions::default()).unwrap();
//! assert_eq!(css, ".a .b {\n  color: red;\n}\n");
//! ```

pub mod emitter;
pub mod options;

pub use emitter::{emit, EmitOptions};
pub use lessrs_common::{format_error, CompileError, CompileResult, ErrorKind};
pub use options::CompileOptions;

use lessrs_common::{CommentStripper, StylesheetStats, VisitorMut};
use lessrs_evaluator::{resolve, Evaluator};
use lessrs_parser::parse;
use tracing::{debug, info, instrument, warn};

/// Compile LESS source to CSS text
#[instrument(skip(source, options), fields(bytes = source.len(), compress = options.compress))]
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<String> {
    match run_pipeline(source, options) {
        Ok(css) => Ok(css),
        Err(err) if options.silence_errors => {
            warn!(error = %err, "Compilation failed, returning source unchanged");
            Ok(source.to_string())
        }
        Err(err) => Err(err),
    }
}

fn run_pipeline(source: &str, options: &CompileOptions) -> CompileResult<String> {
    info!("Starting compilation");

    let mut sheet = parse(source).map_err(|err| CompileError::from_parse(&err, source))?;
    if options.compress || options.strip_comments {
        let mut stripper = CommentStripper::default();
        stripper.visit_stylesheet_mut(&mut sheet);
        debug!(removed = stripper.removed, "Stripped comments");
    }

    let stats = StylesheetStats::collect(&sheet);
    debug!(
        rulesets = stats.rulesets,
        variables = stats.variables,
        mixin_calls = stats.mixin_calls,
        "Parsed stylesheet"
    );

    let evaluated = Evaluator::new()
        .evaluate(&sheet)
        .map_err(|err| CompileError::from_eval(&err, source))?;
    let resolved = resolve(&evaluated);
    let css = emit(&resolved, &options.emit_options());

    info!(output_bytes = css.len(), "Compilation complete");
    Ok(css)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expanded(source: &str) -> String {
        compile(source, &CompileOptions::default()).unwrap()
    }

    fn compact(source: &str) -> String {
        compile(source, &CompileOptions::compressed()).unwrap()
    }

    #[test]
    fn test_plain_css_round_trip() {
        let source = ".a {\n  color: red;\n}\n.b > .c {\n  margin: 0 auto;\n}\n";
        assert_eq!(expanded(source), source);
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(expanded(""), "");
        assert_eq!(compact("  \n"), "");
    }

    #[test]
    fn test_nesting() {
        assert_eq!(
            expanded(".a { .b { color: red; } }"),
            ".a .b {\n  color: red;\n}\n"
        );
    }

    #[test]
    fn test_compact_output() {
        let source = "/* note */\n.a, .b > .c { color: #FFFFFF; margin: 0 auto; font-family: a, b; }";
        assert_eq!(compact(source), ".a,.b>.c{color:#fff;margin:0 auto;font-family:a,b}");
    }

    #[test]
    fn test_long_selector_lists_wrap() {
        assert_eq!(
            expanded("h1, h2, h3, h4 { margin: 0; }"),
            "h1,\nh2,\nh3,\nh4 {\n  margin: 0;\n}\n"
        );
        assert_eq!(
            expanded("h1, h2, h3 { margin: 0; }"),
            "h1, h2, h3 {\n  margin: 0;\n}\n"
        );
    }

    #[test]
    fn test_media_indentation() {
        let css = expanded(".a { color: red; @media print { color: black; } }");
        assert_eq!(
            css,
            ".a {\n  color: red;\n}\n@media print {\n  .a {\n    color: black;\n  }\n}\n"
        );
    }

    #[test]
    fn test_comments_kept_unless_stripped() {
        let source = "/* top */\n.a { /* in */ color: red; }";
        assert_eq!(
            expanded(source),
            "/* top */\n.a {\n  /* in */\n  color: red;\n}\n"
        );

        let options = CompileOptions {
            strip_comments: true,
            ..CompileOptions::default()
        };
        assert_eq!(compile(source, &options).unwrap(), ".a {\n  color: red;\n}\n");
    }
}
