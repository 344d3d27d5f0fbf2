use crate::diagnostic::RawDiagnostic;
use crate::helpers;
use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use swc_core::common::sync::Lrc;
use swc_core::common::comments::SingleThreadedComments;
use swc_core::common::{DUMMY_SP, FileName, SourceFile, SourceMap, Span, Spanned};
use swc_core::ecma::ast::{EsVersion, Module, ModuleItem};
use swc_core::ecma::parser::{EsSyntax, Syntax, TsSyntax, parse_file_as_module};

/// The syntax error code every parser failure is reported under.
pub const SYNTAX_ERROR_CODE: u32 = 1005;

/// A parsed buffer together with its comments and the errors recovered
/// while parsing it.
#[derive(Debug)]
pub struct ParsedSource {
    pub file_name: String,
    pub source_file: Lrc<SourceFile>,
    pub module: Module,
    pub parse_diagnostics: Vec<RawDiagnostic>,
    comments: SingleThreadedComments,
}

impl ParsedSource {
    pub fn text(&self) -> &str {
        &self.source_file.src
    }

    pub fn is_declaration(&self) -> bool {
        helpers::is_declaration_file(&self.file_name)
    }

    pub fn is_javascript(&self) -> bool {
        helpers::is_javascript_file(&self.file_name)
    }

    /// Files without a top-level import or export contribute to the global scope.
    pub fn is_external_module(&self) -> bool {
        self.module
            .body
            .iter()
            .any(|item| matches!(item, ModuleItem::ModuleDecl(_)))
    }

    /// A private copy of the file's comments. Printing drains the store it is
    /// given, so every emission takes its own.
    pub fn comments(&self) -> SingleThreadedComments {
        let (leading, trailing) = self.comments.borrow_all();
        SingleThreadedComments::from_leading_and_trailing(
            Rc::new(RefCell::new(leading.clone())),
            Rc::new(RefCell::new(trailing.clone())),
        )
    }

    /// 0-based offset and length of a span inside this file.
    pub fn span_range(&self, span: Span) -> (usize, usize) {
        let start = span.lo.0.saturating_sub(self.source_file.start_pos.0) as usize;
        let end = span.hi.0.saturating_sub(self.source_file.start_pos.0) as usize;
        (start, end.saturating_sub(start))
    }
}

/// Per-call parse cache: each path is parsed at most once.
pub struct SourceFileCache {
    source_map: Lrc<SourceMap>,
    parsed: RefCell<AHashMap<String, Rc<ParsedSource>>>,
}

impl Default for SourceFileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFileCache {
    pub fn new() -> Self {
        Self {
            source_map: Lrc::new(SourceMap::default()),
            parsed: RefCell::new(AHashMap::new()),
        }
    }

    pub fn source_map(&self) -> Lrc<SourceMap> {
        self.source_map.clone()
    }

    /// Returns the memoized tree for `file_name`, parsing `text()` on first request.
    pub fn get(&self, file_name: &str, text: impl FnOnce() -> String) -> Rc<ParsedSource> {
        if let Some(parsed) = self.parsed.borrow().get(file_name) {
            return parsed.clone();
        }
        let parsed = Rc::new(self.parse(file_name, text()));
        self.parsed
            .borrow_mut()
            .insert(file_name.to_string(), parsed.clone());
        parsed
    }

    pub fn len(&self) -> usize {
        self.parsed.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.borrow().is_empty()
    }

    fn parse(&self, file_name: &str, text: String) -> ParsedSource {
        log::debug!("Parsing {file_name}");
        let source_file = self
            .source_map
            .new_source_file(FileName::Custom(file_name.to_string()).into(), text);

        let comments = SingleThreadedComments::default();
        let mut recovered = Vec::new();
        let result = parse_file_as_module(
            &source_file,
            syntax_for(file_name),
            EsVersion::EsNext,
            Some(&comments),
            &mut recovered,
        );

        let mut parsed = ParsedSource {
            file_name: file_name.to_string(),
            source_file,
            module: Module {
                span: DUMMY_SP,
                body: vec![],
                shebang: None,
            },
            parse_diagnostics: vec![],
            comments,
        };

        let mut errors = recovered;
        match result {
            Ok(module) => parsed.module = module,
            Err(error) => errors.push(error),
        }
        parsed.parse_diagnostics = errors
            .into_iter()
            .map(|error| {
                let range = parsed.span_range(error.span());
                RawDiagnostic::error(
                    Some(file_name),
                    SYNTAX_ERROR_CODE,
                    Some(range),
                    error.kind().msg().to_string(),
                )
            })
            .collect();
        parsed
    }
}

/// Always the most permissive syntax for the file kind; target checks happen later.
fn syntax_for(file_name: &str) -> Syntax {
    let lower = file_name.to_ascii_lowercase();
    if helpers::is_javascript_file(&lower) {
        return Syntax::Es(EsSyntax {
            jsx: true,
            decorators: true,
            ..Default::default()
        });
    }
    Syntax::Typescript(TsSyntax {
        tsx: lower.ends_with(".tsx"),
        decorators: true,
        dts: helpers::is_declaration_file(&lower),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn parses_each_path_once() {
        let cache = SourceFileCache::new();
        let reads = Cell::new(0);
        let read = || {
            reads.set(reads.get() + 1);
            "export const x = 1;".to_string()
        };

        let first = cache.get("a.ts", read);
        let second = cache.get("a.ts", || unreachable!("already parsed"));

        assert_eq!(reads.get(), 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.is_external_module());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn records_syntax_errors_with_positions() {
        let cache = SourceFileCache::new();
        let parsed = cache.get("broken.ts", || "const = 1;".to_string());

        assert!(!parsed.parse_diagnostics.is_empty());
        let diagnostic = &parsed.parse_diagnostics[0];
        assert_eq!(diagnostic.file.as_deref(), Some("broken.ts"));
        assert!(diagnostic.start.is_some_and(|start| start >= 6));
    }

    #[test]
    fn declaration_files_parse_in_ambient_mode() {
        let cache = SourceFileCache::new();
        let parsed = cache.get("node_modules/lib/index.d.ts", || {
            "declare function f(): void;\ndeclare const y: number;".to_string()
        });

        assert!(parsed.parse_diagnostics.is_empty());
        assert!(parsed.is_declaration());
        assert!(!parsed.is_external_module());
    }

    #[test]
    fn comments_survive_repeated_copies() {
        let cache = SourceFileCache::new();
        let parsed = cache.get("a.ts", || "// keep me\nexport const x = 1; // trailing\n".to_string());
        let count = |comments: SingleThreadedComments| {
            let (leading, trailing) = comments.take_all();
            let total = leading.borrow().values().flatten().count() + trailing.borrow().values().flatten().count();
            leading.borrow_mut().clear();
            trailing.borrow_mut().clear();
            total
        };

        assert_eq!(count(parsed.comments()), 2);
        assert_eq!(count(parsed.comments()), 2);
    }

    #[test]
    fn missing_text_parses_as_empty() {
        let cache = SourceFileCache::new();
        let parsed = cache.get("missing.ts", String::new);
        assert!(parsed.module.body.is_empty());
        assert!(parsed.parse_diagnostics.is_empty());
    }
}
