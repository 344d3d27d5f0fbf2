use super::program::Program;
use super::source_cache::ParsedSource;
use crate::config::CompilerOptions;
use crate::diagnostic::{DiagnosticSink, MessageText, RawDiagnostic};
use std::sync::Arc;
use swc_core::common::sync::Lrc;
use swc_core::common::{Mark, SourceMap, Span};
use swc_core::ecma::ast::Module;

/// What a rewriting factory sees of the file it is rewriting.
pub struct TransformationContext<'a> {
    pub source: &'a ParsedSource,
    pub options: &'a CompilerOptions,
    pub unresolved_mark: Mark,
    pub top_level_mark: Mark,
    pub source_map: Lrc<SourceMap>,
    pub diagnostics: &'a DiagnosticSink,
}

impl TransformationContext<'_> {
    pub fn file_name(&self) -> &str {
        &self.source.file_name
    }

    /// Records an error against a span of the file being rewritten.
    pub fn report(&self, span: Span, code: u32, message: impl Into<MessageText>) {
        self.diagnostics.push(RawDiagnostic::error(
            Some(&self.source.file_name),
            code,
            Some(self.source.span_range(span)),
            message,
        ));
    }
}

/// A rewriting pass applied to one parsed module in place.
pub trait TransformerFactory {
    fn transform(&self, context: &TransformationContext<'_>, module: &mut Module);
}

impl<F> TransformerFactory for F
where
    F: Fn(&TransformationContext<'_>, &mut Module),
{
    fn transform(&self, context: &TransformationContext<'_>, module: &mut Module) {
        self(context, module)
    }
}

/// Factories run before and after the TypeScript strip during emission.
#[derive(Default)]
pub struct CustomTransformers {
    pub before: Vec<Box<dyn TransformerFactory>>,
    pub after: Vec<Box<dyn TransformerFactory>>,
}

impl CustomTransformers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, factory: impl TransformerFactory + 'static) -> Self {
        self.before.push(Box::new(factory));
        self
    }

    pub fn after(mut self, factory: impl TransformerFactory + 'static) -> Self {
        self.after.push(Box::new(factory));
        self
    }
}

/// Builds the factories for one call from its program and diagnostics list.
pub type TransformerProvider = Arc<dyn Fn(&Program, &DiagnosticSink) -> CustomTransformers + Send + Sync>;

/// Wraps a closure as a [`TransformerProvider`].
pub fn provider<F>(build: F) -> TransformerProvider
where
    F: Fn(&Program, &DiagnosticSink) -> CustomTransformers + Send + Sync + 'static,
{
    Arc::new(build)
}
