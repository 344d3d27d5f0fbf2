use super::program::Program;
use super::source_cache::ParsedSource;
use super::transformers::{CustomTransformers, TransformationContext, TransformerFactory};
use crate::config::{CompilerOptions, ScriptTarget};
use crate::diagnostic::DiagnosticSink;
use crate::error::EmbedError;
use crate::helpers;
use anyhow::Result;
use swc_core::common::comments::{Comments, SingleThreadedComments};
use swc_core::common::sync::Lrc;
use swc_core::common::{Mark, SourceMap};
use swc_core::ecma::ast::{Decorator, EsVersion, Module, ModuleItem, Pass, Program as EsProgram};
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::codegen::{Config, Emitter};
use swc_core::ecma::transforms::base::feature::enable_available_feature_from_es_version;
use swc_core::ecma::transforms::base::fixer::fixer;
use swc_core::ecma::transforms::base::helpers::{HELPERS, Helpers, inject_helpers};
use swc_core::ecma::transforms::base::hygiene::hygiene;
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::transforms::compat::{es3, es2015, es2016, es2017, es2018, es2019, es2020, es2021, es2022};
use swc_core::ecma::transforms::module::common_js::common_js;
use swc_core::ecma::transforms::module::path::Resolver;
use swc_core::ecma::transforms::module::util::{self as module_util, ImportInterop};
use swc_core::ecma::transforms::proposal::decorator_2022_03::decorator_2022_03;
use swc_core::ecma::transforms::proposal::decorators;
use swc_core::ecma::transforms::typescript::strip;
use swc_core::ecma::visit::{Visit, VisitWith};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitResult {
    pub emit_skipped: bool,
    pub emitted_files: Vec<String>,
}

/// Runs a pass over a module through the `Program` wrapper swc passes expect.
pub fn apply(module: Module, mut pass: impl Pass) -> Module {
    let mut program = EsProgram::Module(module);
    pass.process(&mut program);
    match program {
        EsProgram::Module(module) => module,
        EsProgram::Script(script) => Module {
            span: script.span,
            body: script.body.into_iter().map(ModuleItem::Stmt).collect(),
            shebang: script.shebang,
        },
    }
}

fn run_factories(
    factories: &[Box<dyn TransformerFactory>],
    context: &TransformationContext<'_>,
    module: &mut Module,
) {
    for factory in factories {
        factory.transform(context, module);
    }
}

/// Prints a module back to source text with `\n` newlines, draining
/// `comments` as they are written.
pub fn print(
    cm: &Lrc<SourceMap>,
    module: &Module,
    target: EsVersion,
    comments: Option<&dyn Comments>,
    file_name: &str,
) -> Result<String> {
    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: Config::default().with_target(target),
            cm: cm.clone(),
            comments,
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        emitter.emit_module(module).map_err(|source| EmbedError::Print {
            file: file_name.to_string(),
            source,
        })?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[derive(Default)]
struct DecoratorFinder {
    found: bool,
}

impl Visit for DecoratorFinder {
    fn visit_decorator(&mut self, _: &Decorator) {
        self.found = true;
    }
}

fn has_decorators(module: &Module) -> bool {
    let mut finder = DecoratorFinder::default();
    module.visit_with(&mut finder);
    finder.found
}

/// `experimentalDecorators` selects the legacy lowering, which is also the
/// only one that can emit `design:*` metadata. Runs while types are present.
fn lower_decorators(module: Module, options: &CompilerOptions) -> Module {
    if !has_decorators(&module) {
        return module;
    }
    if options.experimental_decorators {
        apply(
            module,
            decorators(decorators::Config {
                legacy: true,
                emit_metadata: options.emit_decorator_metadata,
                use_define_for_class_fields: options.use_define_for_class_fields(),
            }),
        )
    } else {
        apply(module, decorator_2022_03())
    }
}

/// Lowers every syntax level above `options.target`, newest first.
fn downlevel(
    mut module: Module,
    options: &CompilerOptions,
    unresolved_mark: Mark,
    comments: &SingleThreadedComments,
) -> Module {
    let target = options.target;
    if target < ScriptTarget::ES2022 {
        let config = es2022::Config {
            class_properties: es2022::class_properties::Config {
                set_public_fields: !options.use_define_for_class_fields(),
                ..Default::default()
            },
        };
        module = apply(module, es2022(config, unresolved_mark));
    }
    if target < ScriptTarget::ES2021 {
        module = apply(module, es2021());
    }
    if target < ScriptTarget::ES2020 {
        module = apply(module, es2020(Default::default(), unresolved_mark));
    }
    if target < ScriptTarget::ES2019 {
        module = apply(module, es2019());
    }
    if target < ScriptTarget::ES2018 {
        module = apply(module, es2018(Default::default()));
    }
    if target < ScriptTarget::ES2017 {
        module = apply(module, es2017(Default::default(), unresolved_mark));
    }
    if target < ScriptTarget::ES2016 {
        module = apply(module, es2016());
    }
    if target < ScriptTarget::ES2015 {
        // Without downlevelIteration `for..of` only walks arrays.
        let config = es2015::Config {
            for_of: es2015::for_of::Config {
                assume_array: !options.downlevel_iteration,
                ..Default::default()
            },
            ..Default::default()
        };
        module = apply(module, es2015(unresolved_mark, Some(comments), config));
    }
    if target < ScriptTarget::ES5 {
        module = apply(module, es3(true));
    }
    module
}

fn module_config(options: &CompilerOptions) -> module_util::Config {
    let import_interop = if options.es_module_interop {
        ImportInterop::Swc
    } else {
        ImportInterop::None
    };
    module_util::Config {
        import_interop: Some(import_interop),
        ..Default::default()
    }
}

fn emit_file(
    program: &Program,
    source: &ParsedSource,
    transformers: &CustomTransformers,
    diagnostics: &DiagnosticSink,
) -> Result<String> {
    let options = program.options();
    let unresolved_mark = program.unresolved_mark();
    let top_level_mark = program.top_level_mark();
    let cm = program.host().source_map();
    let context = TransformationContext {
        source,
        options,
        unresolved_mark,
        top_level_mark,
        source_map: cm.clone(),
        diagnostics,
    };
    let target = options.target.es_version();
    let comments = source.comments();

    let module = HELPERS.set(&Helpers::new(false), || {
        let mut module = apply(source.module.clone(), resolver(unresolved_mark, top_level_mark, true));
        run_factories(&transformers.before, &context, &mut module);
        module = lower_decorators(module, options);
        if !source.is_javascript() {
            module = apply(module, strip(unresolved_mark, top_level_mark));
        }
        module = downlevel(module, options, unresolved_mark, &comments);
        if options.module.is_commonjs() {
            module = apply(
                module,
                common_js(
                    Resolver::Default,
                    unresolved_mark,
                    module_config(options),
                    enable_available_feature_from_es_version(target),
                ),
            );
        }
        run_factories(&transformers.after, &context, &mut module);
        apply(module, inject_helpers(unresolved_mark))
    });
    let module = apply(module, hygiene());
    let module = apply(module, fixer(Some(&comments)));

    print(&cm, &module, target, Some(&comments), &source.file_name)
}

/// Emits every input file, writing the results through the program's host.
pub fn emit(program: &Program, transformers: &CustomTransformers, diagnostics: &DiagnosticSink) -> Result<EmitResult> {
    let options = program.options();
    if options.no_emit {
        return Ok(EmitResult {
            emit_skipped: true,
            emitted_files: vec![],
        });
    }
    if options.no_emit_on_error && !program.get_pre_emit_diagnostics().is_empty() {
        log::debug!("Skipping emit: the program has errors");
        return Ok(EmitResult {
            emit_skipped: true,
            emitted_files: vec![],
        });
    }

    let mut result = EmitResult::default();
    program.with_globals(|| -> Result<()> {
        for source in program.emittable_files() {
            let Some(output_name) = helpers::output_file_name(&source.file_name, options.allow_js) else {
                continue;
            };
            log::debug!("Emitting {} -> {}", source.file_name, output_name);
            let text = emit_file(program, source, transformers, diagnostics)?;
            program.host().write_file(&output_name, &text);
            result.emitted_files.push(output_name);
        }
        Ok(())
    })?;
    Ok(result)
}
