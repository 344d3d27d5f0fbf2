pub mod rules;

use crate::compiler::EmbedTypeScript;
use crate::compiler::program::Program;
use crate::config::{EmbedProps, InputSet};
use crate::diagnostic::{Category, Diagnostic, DiagnosticCode};
use crate::helpers;
use crate::result::CompileResult;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

pub const RULE_NAMESPACE: &str = "@typescript-eslint/";

/// Code given to lint messages that carry neither a rule nor a message id.
pub const FALLBACK_CODE: &str = "eslint";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "u8")]
pub enum RuleLevel {
    Off,
    Warn,
    Error,
}

impl RuleLevel {
    pub fn severity(&self) -> u8 {
        match self {
            RuleLevel::Off => 0,
            RuleLevel::Warn => 1,
            RuleLevel::Error => 2,
        }
    }
}

impl From<RuleLevel> for u8 {
    fn from(level: RuleLevel) -> Self {
        level.severity()
    }
}

impl TryFrom<serde_json::Value> for RuleLevel {
    type Error = String;

    /// Accepts `"off" | "warn" | "error"`, `0 | 1 | 2`, or `[level, ...options]`.
    fn try_from(value: serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::String(level) => match level.as_str() {
                "off" => Ok(RuleLevel::Off),
                "warn" => Ok(RuleLevel::Warn),
                "error" => Ok(RuleLevel::Error),
                other => Err(format!("invalid rule level \"{other}\"")),
            },
            serde_json::Value::Number(level) => match level.as_u64() {
                Some(0) => Ok(RuleLevel::Off),
                Some(1) => Ok(RuleLevel::Warn),
                Some(2) => Ok(RuleLevel::Error),
                _ => Err(format!("invalid rule level {level}")),
            },
            serde_json::Value::Array(mut values) if !values.is_empty() => RuleLevel::try_from(values.remove(0)),
            other => Err(format!("invalid rule configuration {other}")),
        }
    }
}

/// Rule name → level, as written by the caller.
pub type LintRules = BTreeMap<String, RuleLevel>;

/// Adds the rule namespace to keys that lack it.
pub fn prefix_rules(rules: &LintRules) -> LintRules {
    rules
        .iter()
        .map(|(name, level)| {
            let name = if name.starts_with(RULE_NAMESPACE) {
                name.clone()
            } else {
                format!("{RULE_NAMESPACE}{name}")
            };
            (name, *level)
        })
        .collect()
}

/// What a linter is given besides the source text.
pub struct LintConfig<'a> {
    pub program: &'a Program,
    pub rules: &'a LintRules,
}

/// A single problem reported by a linter, in ESLint's shape: 1-based lines
/// and columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintMessage {
    pub rule_id: Option<String>,
    pub message_id: Option<String>,
    pub severity: u8,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub end_line: Option<usize>,
    pub end_column: Option<usize>,
}

/// The rule-checking pass run against each input file.
pub trait Linter {
    fn verify(&self, source: &str, config: &LintConfig<'_>, file_name: &str) -> Result<Vec<LintMessage>>;
}

/// Absolute offset of a 1-based line/column pair.
pub fn position_from_line_column(source: &str, line: usize, column: usize) -> usize {
    let position: usize = source
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|text| text.len() + 1)
        .sum();
    (position + column).saturating_sub(1)
}

pub fn transform_message(message: &LintMessage, file_name: &str, source: &str) -> Diagnostic {
    let start = position_from_line_column(source, message.line, message.column);
    let end = match (message.end_line, message.end_column) {
        (Some(line), Some(column)) => position_from_line_column(source, line, column),
        _ => start + 1,
    };
    let code = message
        .rule_id
        .clone()
        .or_else(|| message.message_id.clone())
        .unwrap_or_else(|| FALLBACK_CODE.to_string());

    Diagnostic {
        file: Some(file_name.to_string()),
        category: if message.severity == 2 {
            Category::Error
        } else {
            Category::Warning
        },
        code: DiagnosticCode::Text(code),
        start: Some(start),
        length: Some(end.saturating_sub(start)),
        message_text: message.message.clone(),
    }
}

/// Folds lint diagnostics into a compile result.
pub fn merge_lint_diagnostics(result: CompileResult, lint: Vec<Diagnostic>) -> CompileResult {
    match result {
        CompileResult::Failure {
            output,
            mut diagnostics,
        } => {
            diagnostics.extend(lint);
            CompileResult::Failure { output, diagnostics }
        }
        CompileResult::Success { output } if !lint.is_empty() => CompileResult::Failure {
            output,
            diagnostics: lint,
        },
        result => result,
    }
}

/// An embedded compiler followed by a lint pass over the same program.
pub struct EmbedLint {
    compiler: EmbedTypeScript,
    linter: Box<dyn Linter + Send + Sync>,
    rules: LintRules,
}

impl EmbedLint {
    pub fn new(props: EmbedProps, rules: LintRules) -> Self {
        Self::with_linter(props, rules, rules::RuleLinter::new())
    }

    pub fn with_linter(props: EmbedProps, rules: LintRules, linter: impl Linter + Send + Sync + 'static) -> Self {
        Self {
            compiler: EmbedTypeScript::new(props),
            linter: Box::new(linter),
            rules: prefix_rules(&rules),
        }
    }

    pub fn rules(&self) -> &LintRules {
        &self.rules
    }

    pub fn compile(&self, files: &InputSet) -> CompileResult {
        let files: InputSet = files
            .iter()
            .map(|(path, text)| (helpers::canonical(path), text.clone()))
            .collect();

        let (result, fountain) = self.compiler.compile_with_fountain(&files);
        let Some(fountain) = fountain else {
            return result;
        };
        if matches!(result, CompileResult::Exception { .. }) {
            return result;
        }

        let lint = self.lint(fountain.program(), &files);
        merge_lint_diagnostics(result, lint)
    }

    /// Lints every file against `program`. A file whose lint pass fails
    /// contributes nothing.
    pub fn lint(&self, program: &Program, files: &InputSet) -> Vec<Diagnostic> {
        let config = LintConfig {
            program,
            rules: &self.rules,
        };
        let mut diagnostics = Vec::new();
        for (file_name, source) in files {
            let verified = panic::catch_unwind(AssertUnwindSafe(|| {
                self.linter.verify(source, &config, file_name)
            }))
            .unwrap_or_else(|_| Err(anyhow!("linter panicked")));
            match verified {
                Ok(messages) => diagnostics.extend(
                    messages
                        .iter()
                        .map(|message| transform_message(message, file_name, source)),
                ),
                Err(e) => log::debug!("Skipping lint of {file_name}: {e:?}"),
            }
        }
        diagnostics
    }
}
