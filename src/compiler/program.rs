use super::checker::{self, AmbientScope};
use super::emitter::{self, EmitResult};
use super::host::CompilerHost;
use super::resolution::{self, Resolution};
use super::source_cache::ParsedSource;
use super::transformers::CustomTransformers;
use crate::config::CompilerOptions;
use crate::diagnostic::{DiagnosticSink, RawDiagnostic};
use ahash::AHashMap;
use anyhow::Result;
use std::collections::VecDeque;
use std::rc::Rc;
use swc_core::common::{GLOBALS, Globals, Mark};

/// The front-end's view of one compilation: every file reachable from the
/// roots, how each import resolved, and what is declared globally.
pub struct Program {
    options: CompilerOptions,
    host: Rc<dyn CompilerHost>,
    root_names: Vec<String>,
    files: Vec<Rc<ParsedSource>>,
    file_index: AHashMap<String, usize>,
    resolutions: AHashMap<String, AHashMap<String, Option<Resolution>>>,
    ambient: AmbientScope,
    globals: Rc<Globals>,
    unresolved_mark: Mark,
    top_level_mark: Mark,
}

impl Program {
    pub fn new(root_names: Vec<String>, options: CompilerOptions, host: Rc<dyn CompilerHost>) -> Self {
        let globals = Rc::new(Globals::new());
        let (unresolved_mark, top_level_mark) = GLOBALS.set(&globals, || (Mark::new(), Mark::new()));

        let mut program = Program {
            options,
            host,
            root_names,
            files: Vec::new(),
            file_index: AHashMap::new(),
            resolutions: AHashMap::new(),
            ambient: AmbientScope::new(),
            globals: globals.clone(),
            unresolved_mark,
            top_level_mark,
        };
        GLOBALS.set(&globals, || program.load());
        program
    }

    /// Parses the roots and the default library, gathers their ambient
    /// declarations, then follows imports breadth-first until no new file is
    /// reached.
    fn load(&mut self) {
        let roots = self.root_names.clone();
        for root in &roots {
            self.add_file(root);
        }
        let default_lib = self.host.get_default_lib_file_name();
        if self.host.file_exists(&default_lib) {
            self.add_file(&default_lib);
        }

        let mut queue: VecDeque<usize> = (0..self.files.len()).collect();
        while let Some(index) = queue.pop_front() {
            let source = self.files[index].clone();
            let mut resolved = AHashMap::new();
            for specifier in checker::module_specifiers(&source.module) {
                let specifier = specifier.value.to_string();
                if resolved.contains_key(&specifier) {
                    continue;
                }
                let resolution = resolution::resolve_module_name(
                    &specifier,
                    &source.file_name,
                    &self.options,
                    self.host.as_ref(),
                    &self.ambient.modules,
                );
                if let Some(Resolution::File(target)) = &resolution {
                    if !self.file_index.contains_key(target) {
                        self.add_file(target);
                        queue.push_back(self.files.len() - 1);
                    }
                }
                resolved.insert(specifier, resolution);
            }
            self.resolutions.insert(source.file_name.clone(), resolved);
        }
        log::debug!(
            "Program has {} files ({} roots, {} ambient modules)",
            self.files.len(),
            self.root_names.len(),
            self.ambient.modules.len()
        );
    }

    fn add_file(&mut self, file_name: &str) {
        let source = self.host.get_source_file(file_name);
        if self.file_index.contains_key(&source.file_name) {
            return;
        }
        self.ambient.collect(&source);
        self.file_index.insert(source.file_name.clone(), self.files.len());
        self.files.push(source);
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn host(&self) -> &Rc<dyn CompilerHost> {
        &self.host
    }

    pub fn source_files(&self) -> &[Rc<ParsedSource>] {
        &self.files
    }

    pub fn get_source_file(&self, file_name: &str) -> Option<&Rc<ParsedSource>> {
        let file_name = self.host.get_canonical_file_name(file_name);
        self.file_index.get(&file_name).map(|index| &self.files[*index])
    }

    pub fn ambient_scope(&self) -> &AmbientScope {
        &self.ambient
    }

    /// How `specifier` resolved when imported from `file_name`.
    pub fn resolved_module(&self, file_name: &str, specifier: &str) -> Option<Resolution> {
        self.resolutions
            .get(file_name)
            .and_then(|resolved| resolved.get(specifier))
            .cloned()
            .flatten()
    }

    pub fn unresolved_mark(&self) -> Mark {
        self.unresolved_mark
    }

    pub fn top_level_mark(&self) -> Mark {
        self.top_level_mark
    }

    /// Runs `op` with this program's hygiene data installed.
    pub fn with_globals<R>(&self, op: impl FnOnce() -> R) -> R {
        GLOBALS.set(&self.globals, op)
    }

    /// Whether the pre-emit check looks at `source`.
    fn is_checked(&self, source: &ParsedSource) -> bool {
        if self.host.is_external_library_file(&source.file_name) {
            return false;
        }
        !source.is_declaration() || !self.options.skip_lib_check
    }

    fn checked_files<'a>(&'a self, file_name: Option<&'a str>) -> impl Iterator<Item = &'a Rc<ParsedSource>> + 'a {
        let only = file_name.map(|name| self.host.get_canonical_file_name(name));
        self.files
            .iter()
            .filter(move |source| only.as_ref().is_none_or(|name| *name == source.file_name))
            .filter(move |source| self.is_checked(source))
    }

    pub fn get_syntactic_diagnostics(&self, file_name: Option<&str>) -> Vec<RawDiagnostic> {
        self.checked_files(file_name)
            .flat_map(|source| source.parse_diagnostics.iter().cloned())
            .collect()
    }

    pub fn get_semantic_diagnostics(&self, file_name: Option<&str>) -> Vec<RawDiagnostic> {
        let mut diagnostics = Vec::new();
        for source in self.checked_files(file_name) {
            if source.is_javascript() {
                continue;
            }
            let mut file_diagnostics = checker::check_imports(self, source);
            file_diagnostics.extend(checker::check_names(self, source));
            file_diagnostics.sort_by_key(|diagnostic| diagnostic.start);
            diagnostics.extend(file_diagnostics);
        }
        diagnostics
    }

    /// Syntax errors when there are any, the semantic errors otherwise.
    pub fn get_pre_emit_diagnostics(&self) -> Vec<RawDiagnostic> {
        let syntactic = self.get_syntactic_diagnostics(None);
        if !syntactic.is_empty() {
            return syntactic;
        }
        self.get_semantic_diagnostics(None)
    }

    /// Emits every input file through the host, running `transformers` around
    /// the TypeScript strip.
    pub fn emit(&self, transformers: &CustomTransformers, diagnostics: &DiagnosticSink) -> Result<EmitResult> {
        emitter::emit(self, transformers, diagnostics)
    }

    /// Files that produce output: non-declaration roots supplied by the caller.
    pub fn emittable_files(&self) -> impl Iterator<Item = &Rc<ParsedSource>> {
        self.root_names
            .iter()
            .filter_map(move |name| self.get_source_file(name))
            .filter(move |source| !self.host.is_external_library_file(&source.file_name))
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("root_names", &self.root_names)
            .field("files", &self.files.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::host::VirtualHost;
    use crate::compiler::source_cache::SourceFileCache;
    use crate::config::{DEFAULT_LIB_FILE_NAME, ExternalSet, HostEnvironment, InputSet};
    use crate::diagnostic::{DiagnosticCode, get_message_text};
    use crate::result::OutputMap;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::sync::Arc;

    fn program_with(input: &[(&str, &str)], external: &[(&str, &str)], options: CompilerOptions) -> Program {
        let input: InputSet = input
            .iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect();
        let external: ExternalSet = external
            .iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect();
        let mut roots: Vec<String> = input.keys().cloned().collect();
        roots.extend(external.keys().filter(|path| path.ends_with(".d.ts")).cloned());
        let host = VirtualHost::new(
            &input,
            Arc::new(external),
            HostEnvironment::default(),
            Rc::new(SourceFileCache::new()),
            Rc::new(RefCell::new(OutputMap::new())),
        );
        Program::new(roots, options, Rc::new(host))
    }

    fn program(input: &[(&str, &str)], external: &[(&str, &str)]) -> Program {
        program_with(input, external, CompilerOptions::default())
    }

    fn codes(diagnostics: &[RawDiagnostic]) -> Vec<DiagnosticCode> {
        diagnostics.iter().map(|diagnostic| diagnostic.code.clone()).collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let program = program(
            &[
                ("a.ts", "import { y } from './b';\nexport const x: number = y + 1;\nconsole.log(x);"),
                ("b.ts", "export const y = 1;"),
            ],
            &[],
        );
        assert_eq!(program.get_pre_emit_diagnostics(), vec![]);
    }

    #[test]
    fn reports_missing_modules() {
        let program = program(&[("a.ts", "import { Y } from './b'; const z: Y = {};")], &[]);
        let diagnostics = program.get_pre_emit_diagnostics();

        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::Number(2307)]);
        assert_eq!(
            get_message_text(&diagnostics[0].message_text),
            "Cannot find module './b' or its corresponding type declarations."
        );
        assert_eq!(diagnostics[0].start, Some(18));
        assert_eq!(diagnostics[0].length, Some(5));
    }

    #[test]
    fn reports_undeclared_names() {
        let program = program(&[("a.ts", "const x = 1;\nconst y = x + z;")], &[]);
        let diagnostics = program.get_pre_emit_diagnostics();

        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::Number(2304)]);
        assert_eq!(get_message_text(&diagnostics[0].message_text), "Cannot find name 'z'.");
        assert_eq!(diagnostics[0].start, Some(27));
    }

    #[test]
    fn reports_missing_members_and_defaults() {
        let program = program(
            &[
                ("a.ts", "import def, { x, nope } from './b';\nconsole.log(def, x, nope);"),
                ("b.ts", "export const x = 1;"),
            ],
            &[],
        );
        let diagnostics = program.get_pre_emit_diagnostics();

        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::Number(1192), DiagnosticCode::Number(2305)]
        );
        assert_eq!(
            get_message_text(&diagnostics[1].message_text),
            "Module '\"./b\"' has no exported member 'nope'."
        );
    }

    #[test]
    fn ambient_declarations_satisfy_names_and_modules() {
        let program = program(
            &[("main.ts", "import { readFileSync } from 'fs';\nlog(readFileSync('a'));")],
            &[
                ("node_modules/@types/node/fs.d.ts", "declare module 'fs' { export function readFileSync(path: string): string; }"),
                ("node_modules/@types/logger/index.d.ts", "declare function log(value: unknown): void;"),
            ],
        );
        assert_eq!(program.get_pre_emit_diagnostics(), vec![]);
    }

    #[test]
    fn export_star_forwards_names() {
        let program = program(
            &[
                ("index.ts", "export * from './impl';"),
                ("impl.ts", "export function run() {}"),
                ("main.ts", "import { run, missing } from './index';\nrun(); missing();"),
            ],
            &[],
        );
        let diagnostics = program.get_semantic_diagnostics(Some("main.ts"));
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::Number(2305)]);
    }

    #[test]
    fn syntax_errors_mask_semantic_errors() {
        let program = program(&[("a.ts", "const = ;\nundeclared;")], &[]);
        let diagnostics = program.get_pre_emit_diagnostics();
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.iter().all(|diagnostic| diagnostic.code == DiagnosticCode::Number(1005)));
    }

    #[test]
    fn library_files_are_never_checked() {
        let program = program(
            &[("a.ts", "export {};")],
            &[("node_modules/broken/index.d.ts", "import { nothing } from './gone';")],
        );
        assert_eq!(program.get_pre_emit_diagnostics(), vec![]);
    }

    #[test]
    fn input_declarations_respect_skip_lib_check() {
        let input = [("a.ts", "export {};"), ("types.d.ts", "import { nothing } from './gone';\nexport {};")];
        let checked = program(&input, &[]);
        assert_eq!(codes(&checked.get_pre_emit_diagnostics()), vec![DiagnosticCode::Number(2307)]);

        let options = CompilerOptions {
            skip_lib_check: true,
            ..Default::default()
        };
        let skipped = program_with(&input, &[], options);
        assert_eq!(skipped.get_pre_emit_diagnostics(), vec![]);
    }

    fn program_over_inputs(input: &[(&str, &str)], external: &[(&str, &str)]) -> Program {
        let input: InputSet = input
            .iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect();
        let external: ExternalSet = external
            .iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect();
        let roots = input.keys().cloned().collect();
        let host = VirtualHost::new(
            &input,
            Arc::new(external),
            HostEnvironment::default(),
            Rc::new(SourceFileCache::new()),
            Rc::new(RefCell::new(OutputMap::new())),
        );
        Program::new(roots, CompilerOptions::default(), Rc::new(host))
    }

    #[test]
    fn default_library_is_loaded_when_present() {
        let input = [("a.ts", "export const copy = fromDefaultLib(1);")];

        let without = program_over_inputs(&input, &[]);
        assert!(without.get_source_file(DEFAULT_LIB_FILE_NAME).is_none());
        assert_eq!(codes(&without.get_pre_emit_diagnostics()), vec![DiagnosticCode::Number(2304)]);

        let with = program_over_inputs(
            &input,
            &[(DEFAULT_LIB_FILE_NAME, "declare function fromDefaultLib(value: number): number;")],
        );
        let default_lib = with.host().get_default_lib_file_name();
        assert_eq!(default_lib, DEFAULT_LIB_FILE_NAME);
        assert!(with.host().read_file(&default_lib).is_some());
        assert!(with.get_source_file(&default_lib).is_some());
        assert_eq!(with.get_pre_emit_diagnostics(), vec![]);
        assert_eq!(with.emittable_files().count(), 1);
    }
}
