use crate::emitter::EmitOptions;
use serde::{Deserialize, Serialize};

/// Compiler options, readable from the JSON keys `compress`,
/// `stripComments` and `silenceErrors`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Compact output with comments removed
    pub compress: bool,
    pub strip_comments: bool,
    /// Return the source unchanged instead of failing. Hides real errors;
    /// only for callers that must always get text back.
    pub silence_errors: bool,
}

impl CompileOptions {
    pub fn compressed() -> Self {
        Self {
            compress: true,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            compress: self.compress,
            strip_comments: self.strip_comments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_all_off() {
        let options = CompileOptions::from_json("{}").unwrap();
        assert_eq!(options, CompileOptions::default());
        assert!(!options.silence_errors);
    }

    #[test]
    fn test_camel_case_keys() {
        let options =
            CompileOptions::from_json(r#"{"compress": true, "stripComments": true, "silenceErrors": true}"#)
                .unwrap();
        assert!(options.compress);
        assert!(options.strip_comments);
        assert!(options.silence_errors);
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(CompileOptions::from_json(r#"{"compress": "yes"}"#).is_err());
    }
}
