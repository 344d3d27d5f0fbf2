use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

/// Severity as reported by the front-end, using its numeric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Suggestion = 2,
    Message = 3,
}

impl DiagnosticCategory {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(DiagnosticCategory::Warning),
            1 => Some(DiagnosticCategory::Error),
            2 => Some(DiagnosticCategory::Suggestion),
            3 => Some(DiagnosticCategory::Message),
            _ => None,
        }
    }
}

/// A message that is either flat text or a chain of nested explanations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageText {
    Flat(String),
    Chain(MessageChain),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChain {
    pub text: String,
    pub next: Vec<MessageChain>,
}

impl MessageChain {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            next: Vec::new(),
        }
    }

    pub fn with_next(mut self, next: MessageChain) -> Self {
        self.next.push(next);
        self
    }
}

impl From<String> for MessageText {
    fn from(text: String) -> Self {
        MessageText::Flat(text)
    }
}

impl From<&str> for MessageText {
    fn from(text: &str) -> Self {
        MessageText::Flat(text.to_string())
    }
}

impl From<MessageChain> for MessageText {
    fn from(chain: MessageChain) -> Self {
        MessageText::Chain(chain)
    }
}

/// A diagnostic in the front-end's own representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDiagnostic {
    pub file: Option<String>,
    pub category: DiagnosticCategory,
    pub code: DiagnosticCode,
    pub start: Option<usize>,
    pub length: Option<usize>,
    pub message_text: MessageText,
}

impl RawDiagnostic {
    pub fn error(file: Option<&str>, code: u32, span: Option<(usize, usize)>, message: impl Into<MessageText>) -> Self {
        Self {
            file: file.map(str::to_string),
            category: DiagnosticCategory::Error,
            code: DiagnosticCode::Number(code),
            start: span.map(|(start, _)| start),
            length: span.map(|(_, length)| length),
            message_text: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Error,
    Warning,
    Suggestion,
    Message,
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Error => write!(f, "error"),
            Category::Warning => write!(f, "warning"),
            Category::Suggestion => write!(f, "suggestion"),
            Category::Message => write!(f, "message"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiagnosticCode {
    Number(u32),
    Text(String),
}

impl Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticCode::Number(code) => write!(f, "TS{code}"),
            DiagnosticCode::Text(code) => write!(f, "{code}"),
        }
    }
}

/// The normalized, serializable diagnostic returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub file: Option<String>,
    pub category: Category,
    pub code: DiagnosticCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    pub message_text: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.start) {
            (Some(file), Some(start)) => write!(f, "{file}:{start} ")?,
            (Some(file), None) => write!(f, "{file} ")?,
            _ => {}
        }
        write!(f, "{} {}: {}", self.category, self.code, self.message_text)
    }
}

/// Maps the numeric severity to its name. Anything unrecognized is an error.
pub fn get_category(category: Option<DiagnosticCategory>) -> Category {
    match category {
        Some(DiagnosticCategory::Message) => Category::Message,
        Some(DiagnosticCategory::Suggestion) => Category::Suggestion,
        Some(DiagnosticCategory::Warning) => Category::Warning,
        Some(DiagnosticCategory::Error) | None => Category::Error,
    }
}

/// Flattens a message chain depth-first, indenting each level by two spaces.
pub fn get_message_text(message: &MessageText) -> String {
    match message {
        MessageText::Flat(text) => text.clone(),
        MessageText::Chain(chain) => {
            let mut lines = Vec::new();
            flatten_chain(chain, 0, &mut lines);
            lines.join("\n")
        }
    }
}

fn flatten_chain(chain: &MessageChain, depth: usize, lines: &mut Vec<String>) {
    lines.push(format!("{}{}", "  ".repeat(depth), chain.text));
    for next in &chain.next {
        flatten_chain(next, depth + 1, lines);
    }
}

pub fn normalize(diagnostic: &RawDiagnostic) -> Diagnostic {
    Diagnostic {
        file: diagnostic.file.clone(),
        category: get_category(Some(diagnostic.category)),
        code: diagnostic.code.clone(),
        start: diagnostic.start,
        length: diagnostic.length,
        message_text: get_message_text(&diagnostic.message_text),
    }
}

/// The append-only diagnostics list of one call.
///
/// Cloning yields another handle to the same list, so transformer factories
/// can hold on to it and push while emission runs.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink(Rc<RefCell<Vec<RawDiagnostic>>>);

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: RawDiagnostic) {
        self.0.borrow_mut().push(diagnostic);
    }

    pub fn extend(&self, diagnostics: impl IntoIterator<Item = RawDiagnostic>) {
        self.0.borrow_mut().extend(diagnostics);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn normalized(&self) -> Vec<Diagnostic> {
        self.0.borrow().iter().map(normalize).collect()
    }
}
