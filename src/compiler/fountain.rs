use super::host::{CompilerHost, VirtualHost};
use super::program::Program;
use super::source_cache::SourceFileCache;
use crate::config::{CompilerOptions, ExternalSet, HostEnvironment, InputSet};
use crate::diagnostic::DiagnosticSink;
use crate::result::OutputMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// The working state of one call: the program, its diagnostics list, the
/// captured output and the parse cache. Never shared between calls.
pub struct Fountain {
    program: Program,
    diagnostics: DiagnosticSink,
    output: Rc<RefCell<OutputMap>>,
    cache: Rc<SourceFileCache>,
    host: Rc<VirtualHost>,
}

impl Fountain {
    /// Builds a program over `input` and the ambient declaration files of `external`.
    pub fn build(
        input: &InputSet,
        external: Arc<ExternalSet>,
        ambient_roots: &[String],
        options: &CompilerOptions,
        environment: &HostEnvironment,
    ) -> Self {
        let cache = Rc::new(SourceFileCache::new());
        let output = Rc::new(RefCell::new(OutputMap::new()));
        let host = Rc::new(VirtualHost::new(
            input,
            external,
            environment.clone(),
            cache.clone(),
            output.clone(),
        ));

        let mut root_names: Vec<String> = input.keys().cloned().collect();
        root_names.extend(ambient_roots.iter().cloned());
        log::debug!(
            "Building program over {} input files and {} ambient declarations",
            input.len(),
            ambient_roots.len()
        );

        let compiler_host: Rc<dyn CompilerHost> = host.clone();
        let program = Program::new(root_names, options.clone(), compiler_host);
        Self {
            program,
            diagnostics: DiagnosticSink::new(),
            output,
            cache,
            host,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    pub fn host(&self) -> &VirtualHost {
        &self.host
    }

    pub fn source_cache(&self) -> &SourceFileCache {
        &self.cache
    }

    /// A copy of everything written so far.
    pub fn output(&self) -> OutputMap {
        self.output.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_build_starts_empty() {
        let mut input = InputSet::new();
        input.insert("a.ts".to_string(), "export const x = 1;".to_string());
        let mut external = ExternalSet::new();
        external.insert("node_modules/lib/index.d.ts".to_string(), "declare const y: number;".to_string());
        external.insert("node_modules/lib/package.json".to_string(), "{}".to_string());
        let external = Arc::new(external);
        let roots = vec!["node_modules/lib/index.d.ts".to_string()];

        let first = Fountain::build(&input, external.clone(), &roots, &CompilerOptions::default(), &HostEnvironment::default());
        first.host().write_file("a.js", "written");
        let second = Fountain::build(&input, external, &roots, &CompilerOptions::default(), &HostEnvironment::default());

        assert_eq!(first.output().len(), 1);
        assert!(second.output().is_empty());
        assert!(second.diagnostics().is_empty());
        assert_eq!(second.source_cache().len(), 2);
        assert_eq!(second.program().source_files().len(), 2);
    }
}
