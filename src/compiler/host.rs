use super::source_cache::{ParsedSource, SourceFileCache};
use crate::config::{ExternalSet, HostEnvironment, InputSet};
use crate::helpers;
use crate::result::OutputMap;
use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use swc_core::common::SourceMap;
use swc_core::common::sync::Lrc;

/// The filesystem callbacks the front-end runs against.
pub trait CompilerHost {
    fn file_exists(&self, file_name: &str) -> bool;
    fn read_file(&self, file_name: &str) -> Option<String>;
    fn write_file(&self, file_name: &str, data: &str);
    fn get_source_file(&self, file_name: &str) -> Rc<ParsedSource>;
    fn get_canonical_file_name(&self, file_name: &str) -> String;
    fn get_default_lib_file_name(&self) -> String;

    /// The source map every parsed file is registered in.
    fn source_map(&self) -> Lrc<SourceMap>;

    /// Files supplied as dependencies rather than user code; never checked.
    fn is_external_library_file(&self, file_name: &str) -> bool {
        file_name.starts_with("node_modules/") || file_name.contains("/node_modules/")
    }

    fn directory_exists(&self, _directory_name: &str) -> bool {
        true
    }

    fn get_directories(&self, _path: &str) -> Vec<String> {
        Vec::new()
    }

    fn get_current_directory(&self) -> String {
        String::new()
    }

    fn get_new_line(&self) -> &str {
        "\n"
    }

    fn use_case_sensitive_file_names(&self) -> bool {
        false
    }
}

/// Lowercase key → stored key, for case-insensitive matching.
fn lowercase_index<'a>(keys: impl Iterator<Item = &'a String>) -> AHashMap<String, String> {
    let mut index = AHashMap::new();
    for key in keys {
        index
            .entry(key.to_lowercase())
            .or_insert_with(|| key.to_string());
    }
    index
}

/// Presents the InputSet and ExternalSet as a read-only filesystem that
/// captures writes into the call's OutputMap.
pub struct VirtualHost {
    input: AHashMap<String, String>,
    external: Arc<ExternalSet>,
    input_index: AHashMap<String, String>,
    external_index: AHashMap<String, String>,
    environment: HostEnvironment,
    cache: Rc<SourceFileCache>,
    output: Rc<RefCell<OutputMap>>,
}

impl VirtualHost {
    pub fn new(
        input: &InputSet,
        external: Arc<ExternalSet>,
        environment: HostEnvironment,
        cache: Rc<SourceFileCache>,
        output: Rc<RefCell<OutputMap>>,
    ) -> Self {
        let input: AHashMap<String, String> = input
            .iter()
            .map(|(path, text)| (helpers::canonical(path), text.clone()))
            .collect();
        let input_index = lowercase_index(input.keys());
        let external_index = lowercase_index(external.keys());
        Self {
            input,
            external,
            input_index,
            external_index,
            environment,
            cache,
            output,
        }
    }

    fn input_key(&self, file_name: &str) -> Option<String> {
        if self.input.contains_key(file_name) {
            return Some(file_name.to_string());
        }
        self.input_index.get(&file_name.to_lowercase()).cloned()
    }

    fn external_key(&self, file_name: &str) -> Option<String> {
        if self.external.contains_key(file_name) {
            return Some(file_name.to_string());
        }
        self.external_index.get(&file_name.to_lowercase()).cloned()
    }

    fn input_text(&self, file_name: &str) -> Option<String> {
        self.input_key(file_name)
            .and_then(|key| self.input.get(&key).cloned())
    }

    fn external_text(&self, file_name: &str) -> Option<String> {
        self.external_key(file_name)
            .and_then(|key| self.external.get(&key).cloned())
    }
}

impl CompilerHost for VirtualHost {
    fn file_exists(&self, file_name: &str) -> bool {
        let file_name = helpers::canonical(file_name);
        self.input_key(&file_name).is_some() || self.external_key(&file_name).is_some()
    }

    fn read_file(&self, file_name: &str) -> Option<String> {
        let file_name = helpers::canonical(file_name);
        self.input_text(&file_name)
            .or_else(|| self.external_text(&file_name))
    }

    fn write_file(&self, file_name: &str, data: &str) {
        log::debug!("Writing {file_name}");
        self.output
            .borrow_mut()
            .insert(helpers::canonical(file_name), data.to_string());
    }

    fn get_source_file(&self, file_name: &str) -> Rc<ParsedSource> {
        let file_name = self.get_canonical_file_name(file_name);
        self.cache.get(&file_name, || {
            self.external_text(&file_name)
                .or_else(|| self.input_text(&file_name))
                .unwrap_or_default()
        })
    }

    /// Separator-normalized name, spelled the way the matching entry is stored.
    fn get_canonical_file_name(&self, file_name: &str) -> String {
        let file_name = helpers::canonical(file_name);
        self.input_key(&file_name)
            .or_else(|| self.external_key(&file_name))
            .unwrap_or(file_name)
    }

    fn get_default_lib_file_name(&self) -> String {
        self.environment.default_lib_file_name.clone()
    }

    fn source_map(&self) -> Lrc<SourceMap> {
        self.cache.source_map()
    }

    fn is_external_library_file(&self, file_name: &str) -> bool {
        let file_name = helpers::canonical(file_name);
        self.input_key(&file_name).is_none() && self.external_key(&file_name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn host(input: &[(&str, &str)], external: &[(&str, &str)]) -> VirtualHost {
        let input: InputSet = input
            .iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect();
        let external: ExternalSet = external
            .iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect();
        VirtualHost::new(
            &input,
            Arc::new(external),
            HostEnvironment::default(),
            Rc::new(SourceFileCache::new()),
            Rc::new(RefCell::new(OutputMap::new())),
        )
    }

    #[test]
    fn input_wins_over_external_on_read() {
        let host = host(&[("shared.d.ts", "input")], &[("shared.d.ts", "external")]);
        assert_eq!(host.read_file("shared.d.ts").as_deref(), Some("input"));
    }

    #[test]
    fn lookups_ignore_separators_and_case() {
        let host = host(&[("src/Main.ts", "x")], &[]);
        assert!(host.file_exists("src\\Main.ts"));
        assert!(host.file_exists("SRC/main.TS"));
        assert_eq!(host.get_canonical_file_name("src\\main.ts"), "src/Main.ts");
        assert!(!host.file_exists("src/other.ts"));
    }

    #[test]
    fn writes_land_in_the_output_map() {
        let host = host(&[], &[]);
        host.write_file("out\\a.js", "exports.x = 1;\n");
        host.write_file("out/a.js", "exports.x = 2;\n");
        assert_eq!(host.output.borrow().get("out/a.js").map(String::as_str), Some("exports.x = 2;\n"));
        assert_eq!(host.output.borrow().len(), 1);
    }

    #[test]
    fn directory_queries_are_degenerate() {
        let host = host(&[], &[]);
        assert!(host.directory_exists("anything"));
        assert!(host.get_directories("node_modules").is_empty());
        assert_eq!(host.get_current_directory(), "");
        assert_eq!(host.get_new_line(), "\n");
        assert!(!host.use_case_sensitive_file_names());
        assert_eq!(host.get_default_lib_file_name(), "node_modules/typescript/lib/lib.es2015.d.ts");
    }

    #[test]
    fn source_files_prefer_external_text() {
        let host = host(
            &[("types.d.ts", "declare const fromInput: number;")],
            &[("types.d.ts", "declare const fromExternal: number;")],
        );
        let parsed = host.get_source_file("types.d.ts");
        assert!(parsed.text().contains("fromExternal"));
        assert!(Rc::ptr_eq(&parsed, &host.get_source_file("TYPES.d.ts")));
        assert!(!host.is_external_library_file("types.d.ts"));
    }

    #[test]
    fn external_only_files_are_library_files() {
        let host = host(&[("a.ts", "")], &[("node_modules/lib/index.d.ts", "")]);
        assert!(host.is_external_library_file("node_modules/lib/index.d.ts"));
        assert!(!host.is_external_library_file("a.ts"));
    }
}
