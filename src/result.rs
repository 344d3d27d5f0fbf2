use crate::diagnostic::Diagnostic;
use crate::error::EmbedError;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;

/// Emitted file path → text.
pub type OutputMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompileResult {
    Success {
        output: OutputMap,
    },
    Failure {
        output: OutputMap,
        diagnostics: Vec<Diagnostic>,
    },
    Exception {
        error: ExceptionError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransformResult {
    Success {
        #[serde(rename = "rewrittenText")]
        rewritten_text: OutputMap,
    },
    Failure {
        #[serde(rename = "rewrittenText")]
        rewritten_text: OutputMap,
        diagnostics: Vec<Diagnostic>,
    },
    Exception {
        error: ExceptionError,
    },
}

/// What was thrown at a call boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExceptionError {
    Error { name: String, message: String, stack: String },
    Raw(String),
}

impl ExceptionError {
    pub fn from_error(error: &anyhow::Error) -> Self {
        let name = error
            .downcast_ref::<EmbedError>()
            .map_or("Error", EmbedError::name)
            .to_string();
        ExceptionError::Error {
            name,
            message: error.to_string(),
            stack: format!("{error:?}"),
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let text = if let Some(text) = payload.downcast_ref::<&str>() {
            text.to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic".to_string()
        };
        ExceptionError::Raw(text)
    }

    pub fn message(&self) -> &str {
        match self {
            ExceptionError::Error { message, .. } => message,
            ExceptionError::Raw(text) => text,
        }
    }
}

impl CompileResult {
    /// `success` when there is nothing to report, `failure` otherwise.
    pub fn from_diagnostics(output: OutputMap, diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            CompileResult::Success { output }
        } else {
            CompileResult::Failure { output, diagnostics }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompileResult::Success { .. })
    }

    pub fn output(&self) -> Option<&OutputMap> {
        match self {
            CompileResult::Success { output } | CompileResult::Failure { output, .. } => Some(output),
            CompileResult::Exception { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileResult::Failure { diagnostics, .. } => diagnostics,
            CompileResult::Success { .. } | CompileResult::Exception { .. } => &[],
        }
    }
}

impl TransformResult {
    pub fn from_diagnostics(rewritten_text: OutputMap, diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            TransformResult::Success { rewritten_text }
        } else {
            TransformResult::Failure {
                rewritten_text,
                diagnostics,
            }
        }
    }

    pub fn rewritten_text(&self) -> Option<&OutputMap> {
        match self {
            TransformResult::Success { rewritten_text } | TransformResult::Failure { rewritten_text, .. } => {
                Some(rewritten_text)
            }
            TransformResult::Exception { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TransformResult::Failure { diagnostics, .. } => diagnostics,
            TransformResult::Success { .. } | TransformResult::Exception { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Category, DiagnosticCode};
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;

    #[test]
    fn tags_results_by_type() {
        let mut output = OutputMap::new();
        output.insert("a.js".to_string(), "export const x = 1;\n".to_string());

        let json = serde_json::to_value(CompileResult::from_diagnostics(output, vec![])).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({ "type": "success", "output": { "a.js": "export const x = 1;\n" } })
        );
    }

    #[test]
    fn failure_requires_diagnostics() {
        let diagnostic = Diagnostic {
            file: None,
            category: Category::Warning,
            code: DiagnosticCode::Text("lint".to_string()),
            start: None,
            length: None,
            message_text: "warn".to_string(),
        };
        let result = TransformResult::from_diagnostics(OutputMap::new(), vec![diagnostic]);
        let json = serde_json::to_value(&result).expect("serializable");

        assert_eq!(json["type"], "failure");
        assert_eq!(json["rewrittenText"], serde_json::json!({}));
        assert_eq!(json["diagnostics"][0]["code"], "lint");
    }

    #[test]
    fn named_errors_keep_their_name() {
        let error = anyhow::Error::new(EmbedError::MissingTransformers);
        match ExceptionError::from_error(&error) {
            ExceptionError::Error { name, message, .. } => {
                assert_eq!(name, "MissingTransformers");
                assert_eq!(message, "Transformers are not defined in props.");
            }
            ExceptionError::Raw(_) => panic!("expected a named error"),
        }

        match ExceptionError::from_error(&anyhow!("boom")) {
            ExceptionError::Error { name, .. } => assert_eq!(name, "Error"),
            ExceptionError::Raw(_) => panic!("expected a named error"),
        }
    }

    #[test]
    fn panic_payloads_are_raw() {
        let payload: Box<dyn Any + Send> = Box::new("front-end crashed");
        assert_eq!(
            ExceptionError::from_panic(payload),
            ExceptionError::Raw("front-end crashed".to_string())
        );
    }
}
