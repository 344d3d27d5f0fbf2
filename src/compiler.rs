pub mod checker;
pub mod emitter;
pub mod fountain;
pub mod host;
pub mod program;
pub mod resolution;
pub mod source_cache;
pub mod transformers;

use self::emitter::{apply, print};
use self::fountain::Fountain;
use self::host::CompilerHost;
use self::transformers::{CustomTransformers, TransformationContext, TransformerFactory};
use crate::config::{EmbedProps, InputSet};
use crate::error::EmbedError;
use crate::result::{CompileResult, ExceptionError, OutputMap, TransformResult};
use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use swc_core::ecma::ast::EsVersion;
use swc_core::ecma::transforms::base::resolver;

/// An embedded compiler: compiles and rewrites in-memory file sets.
///
/// Each call builds its own [`Fountain`]; the only state kept between calls is
/// the list of ExternalSet files that count as ambient declarations.
pub struct EmbedTypeScript {
    props: EmbedProps,
    ambient_declarations: OnceLock<Vec<String>>,
}

impl EmbedTypeScript {
    pub fn new(props: EmbedProps) -> Self {
        Self {
            props,
            ambient_declarations: OnceLock::new(),
        }
    }

    pub fn props(&self) -> &EmbedProps {
        &self.props
    }

    /// ExternalSet entries compiled as roots, derived once per instance.
    pub fn ambient_declarations(&self) -> &[String] {
        self.ambient_declarations.get_or_init(|| {
            let suffix = &self.props.environment.ambient_declaration_suffix;
            self.props
                .external
                .keys()
                .filter(|path| path.ends_with(suffix.as_str()))
                .cloned()
                .collect()
        })
    }

    /// Builds the per-call working state over `files`.
    pub fn fountain(&self, files: &InputSet) -> Fountain {
        Fountain::build(
            files,
            self.props.external.clone(),
            self.ambient_declarations(),
            &self.props.compiler_options,
            &self.props.environment,
        )
    }

    pub fn compile(&self, files: &InputSet) -> CompileResult {
        self.compile_with_fountain(files).0
    }

    /// Compiles `files`, also returning the fountain the result came from
    /// unless the call ended in an exception.
    pub fn compile_with_fountain(&self, files: &InputSet) -> (CompileResult, Option<Fountain>) {
        log::debug!("Compiling {} files", files.len());
        match panic::catch_unwind(AssertUnwindSafe(|| self.try_compile(files))) {
            Ok(Ok((result, fountain))) => (result, Some(fountain)),
            Ok(Err(error)) => {
                log::debug!("Compilation failed: {error:?}");
                (
                    CompileResult::Exception {
                        error: ExceptionError::from_error(&error),
                    },
                    None,
                )
            }
            Err(payload) => (
                CompileResult::Exception {
                    error: ExceptionError::from_panic(payload),
                },
                None,
            ),
        }
    }

    fn try_compile(&self, files: &InputSet) -> Result<(CompileResult, Fountain)> {
        let fountain = self.fountain(files);
        let program = fountain.program();
        let diagnostics = fountain.diagnostics();

        let transformers = match &self.props.transformers {
            Some(provider) => program.with_globals(|| provider(program, diagnostics)),
            None => CustomTransformers::new(),
        };
        program.emit(&transformers, diagnostics)?;
        diagnostics.extend(program.get_pre_emit_diagnostics());

        let result = CompileResult::from_diagnostics(fountain.output(), diagnostics.normalized());
        Ok((result, fountain))
    }

    /// Rewrites every input file with the first `before` factory and prints
    /// the result back to TypeScript, without emitting.
    pub fn transform(&self, files: &InputSet) -> TransformResult {
        log::debug!("Transforming {} files", files.len());
        match panic::catch_unwind(AssertUnwindSafe(|| self.try_transform(files))) {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => TransformResult::Exception {
                error: ExceptionError::from_error(&error),
            },
            Err(payload) => TransformResult::Exception {
                error: ExceptionError::from_panic(payload),
            },
        }
    }

    fn try_transform(&self, files: &InputSet) -> Result<TransformResult> {
        let provider = self
            .props
            .transformers
            .as_ref()
            .ok_or(EmbedError::MissingTransformers)?;

        let fountain = self.fountain(files);
        let program = fountain.program();
        let diagnostics = fountain.diagnostics();
        let transformers = program.with_globals(|| provider(program, diagnostics));
        let factory = transformers
            .before
            .first()
            .ok_or(EmbedError::MissingTransformerFactory)?;

        let cm = fountain.host().source_map();
        let mut rewritten_text = OutputMap::new();
        program.with_globals(|| -> Result<()> {
            for file_name in files.keys() {
                let source = fountain.host().get_source_file(file_name);
                let context = TransformationContext {
                    source: &source,
                    options: program.options(),
                    unresolved_mark: program.unresolved_mark(),
                    top_level_mark: program.top_level_mark(),
                    source_map: cm.clone(),
                    diagnostics,
                };
                let mut module = apply(
                    source.module.clone(),
                    resolver(program.unresolved_mark(), program.top_level_mark(), true),
                );
                factory.transform(&context, &mut module);
                let comments = source.comments();
                let text = print(&cm, &module, EsVersion::EsNext, Some(&comments), file_name)?;
                rewritten_text.insert(file_name.clone(), text);
            }
            Ok(())
        })?;

        Ok(TransformResult::from_diagnostics(rewritten_text, diagnostics.normalized()))
    }
}
