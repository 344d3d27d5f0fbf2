use crate::compiler::transformers::TransformerProvider;
use crate::error::EmbedError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use swc_core::ecma::ast::EsVersion;

/// Logical path → source text of the user's files.
pub type InputSet = BTreeMap<String, String>;

/// Logical path → declaration-only text needed for checking.
pub type ExternalSet = BTreeMap<String, String>;

pub const DEFAULT_LIB_FILE_NAME: &str = "node_modules/typescript/lib/lib.es2015.d.ts";
pub const AMBIENT_DECLARATION_SUFFIX: &str = ".d.ts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScriptTarget {
    ES3,
    ES5,
    #[default]
    ES2015,
    ES2016,
    ES2017,
    ES2018,
    ES2019,
    ES2020,
    ES2021,
    ES2022,
    ESNext,
}

impl ScriptTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptTarget::ES3 => "ES3",
            ScriptTarget::ES5 => "ES5",
            ScriptTarget::ES2015 => "ES2015",
            ScriptTarget::ES2016 => "ES2016",
            ScriptTarget::ES2017 => "ES2017",
            ScriptTarget::ES2018 => "ES2018",
            ScriptTarget::ES2019 => "ES2019",
            ScriptTarget::ES2020 => "ES2020",
            ScriptTarget::ES2021 => "ES2021",
            ScriptTarget::ES2022 => "ES2022",
            ScriptTarget::ESNext => "ESNext",
        }
    }

    pub fn es_version(&self) -> EsVersion {
        match self {
            ScriptTarget::ES3 => EsVersion::Es3,
            ScriptTarget::ES5 => EsVersion::Es5,
            ScriptTarget::ES2015 => EsVersion::Es2015,
            ScriptTarget::ES2016 => EsVersion::Es2016,
            ScriptTarget::ES2017 => EsVersion::Es2017,
            ScriptTarget::ES2018 => EsVersion::Es2018,
            ScriptTarget::ES2019 => EsVersion::Es2019,
            ScriptTarget::ES2020 => EsVersion::Es2020,
            ScriptTarget::ES2021 => EsVersion::Es2021,
            ScriptTarget::ES2022 => EsVersion::Es2022,
            ScriptTarget::ESNext => EsVersion::EsNext,
        }
    }
}

impl FromStr for ScriptTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "es3" => Ok(ScriptTarget::ES3),
            "es5" => Ok(ScriptTarget::ES5),
            "es6" | "es2015" => Ok(ScriptTarget::ES2015),
            "es2016" => Ok(ScriptTarget::ES2016),
            "es2017" => Ok(ScriptTarget::ES2017),
            "es2018" => Ok(ScriptTarget::ES2018),
            "es2019" => Ok(ScriptTarget::ES2019),
            "es2020" => Ok(ScriptTarget::ES2020),
            "es2021" => Ok(ScriptTarget::ES2021),
            "es2022" => Ok(ScriptTarget::ES2022),
            "esnext" | "latest" => Ok(ScriptTarget::ESNext),
            other => Err(format!("unknown target \"{other}\"")),
        }
    }
}

impl TryFrom<String> for ScriptTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScriptTarget> for String {
    fn from(value: ScriptTarget) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModuleKind {
    None,
    #[default]
    CommonJS,
    ES2015,
    ES2020,
    ES2022,
    ESNext,
    Node16,
    NodeNext,
    Preserve,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::None => "None",
            ModuleKind::CommonJS => "CommonJS",
            ModuleKind::ES2015 => "ES2015",
            ModuleKind::ES2020 => "ES2020",
            ModuleKind::ES2022 => "ES2022",
            ModuleKind::ESNext => "ESNext",
            ModuleKind::Node16 => "Node16",
            ModuleKind::NodeNext => "NodeNext",
            ModuleKind::Preserve => "Preserve",
        }
    }

    /// Whether emitted files are lowered to `require`/`exports`.
    pub fn is_commonjs(&self) -> bool {
        matches!(self, ModuleKind::CommonJS | ModuleKind::Node16 | ModuleKind::NodeNext)
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(ModuleKind::None),
            "commonjs" => Ok(ModuleKind::CommonJS),
            "es6" | "es2015" => Ok(ModuleKind::ES2015),
            "es2020" => Ok(ModuleKind::ES2020),
            "es2022" => Ok(ModuleKind::ES2022),
            "esnext" => Ok(ModuleKind::ESNext),
            "node16" => Ok(ModuleKind::Node16),
            "nodenext" => Ok(ModuleKind::NodeNext),
            "preserve" => Ok(ModuleKind::Preserve),
            other => Err(format!("unknown module kind \"{other}\"")),
        }
    }
}

impl TryFrom<String> for ModuleKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleKind> for String {
    fn from(value: ModuleKind) -> Self {
        value.as_str().to_string()
    }
}

/// The `compilerOptions` bag handed verbatim to the front-end.
///
/// Options the front-end does not act on are kept in `extra` so a tsconfig
/// document round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    pub target: ScriptTarget,
    pub module: ModuleKind,
    pub strict: bool,
    pub skip_lib_check: bool,
    pub es_module_interop: bool,
    pub downlevel_iteration: bool,
    pub experimental_decorators: bool,
    pub emit_decorator_metadata: bool,
    pub no_error_truncation: bool,
    pub allow_js: bool,
    pub no_emit: bool,
    pub no_emit_on_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsConfig {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

impl CompilerOptions {
    /// Reads the `compilerOptions` of a tsconfig document.
    pub fn from_tsconfig_str(contents: &str) -> Result<Self> {
        let tsconfig: TsConfig = serde_json::from_str(contents)
            .map_err(|e| EmbedError::InvalidCompilerOptions(e.to_string()))?;
        Ok(tsconfig.compiler_options)
    }

    /// `useDefineForClassFields`, defaulting on from ES2022.
    pub fn use_define_for_class_fields(&self) -> bool {
        self.extra
            .get("useDefineForClassFields")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(self.target >= ScriptTarget::ES2022)
    }

    pub fn from_tsconfig_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Could not read {}: {}", path.to_string_lossy(), e))?;
        Self::from_tsconfig_str(&contents)
    }
}

/// Immutable per-host configuration: where the default library lives and
/// which ExternalSet entries count as ambient declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub default_lib_file_name: String,
    pub ambient_declaration_suffix: String,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            default_lib_file_name: DEFAULT_LIB_FILE_NAME.to_string(),
            ambient_declaration_suffix: AMBIENT_DECLARATION_SUFFIX.to_string(),
        }
    }
}

/// Properties of an embedded compiler instance.
#[derive(Clone, Default)]
pub struct EmbedProps {
    pub compiler_options: CompilerOptions,
    pub external: Arc<ExternalSet>,
    pub transformers: Option<TransformerProvider>,
    pub environment: HostEnvironment,
}

impl fmt::Debug for EmbedProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedProps")
            .field("compiler_options", &self.compiler_options)
            .field("external", &format!("{} files", self.external.len()))
            .field("transformers", &self.transformers.is_some())
            .field("environment", &self.environment)
            .finish()
    }
}

impl EmbedProps {
    pub fn new(compiler_options: CompilerOptions) -> Self {
        Self {
            compiler_options,
            ..Default::default()
        }
    }

    pub fn with_external(mut self, external: ExternalSet) -> Self {
        self.external = Arc::new(external);
        self
    }

    /// Loads an ExternalSet snapshot written by the `external` command.
    pub fn with_external_file(self, path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Could not read {}: {}", path.to_string_lossy(), e))?;
        let external: ExternalSet = serde_json::from_str(&contents)
            .map_err(|e| anyhow!("Could not parse {}: {}", path.to_string_lossy(), e))?;
        Ok(self.with_external(external))
    }

    pub fn with_transformers(mut self, provider: TransformerProvider) -> Self {
        self.transformers = Some(provider);
        self
    }

    pub fn with_environment(mut self, environment: HostEnvironment) -> Self {
        self.environment = environment;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_tsconfig_compiler_options() {
        let options = CompilerOptions::from_tsconfig_str(
            r#"{
                "compilerOptions": {
                    "target": "es2015",
                    "module": "commonjs",
                    "strict": true,
                    "skipLibCheck": true,
                    "baseUrl": "./",
                    "paths": { "@api/*": ["./src/api/*"] },
                    "noUnusedLocals": true
                }
            }"#,
        )
        .expect("valid tsconfig");

        assert_eq!(options.target, ScriptTarget::ES2015);
        assert_eq!(options.module, ModuleKind::CommonJS);
        assert!(options.strict);
        assert!(options.skip_lib_check);
        assert_eq!(options.base_url.as_deref(), Some("./"));
        assert_eq!(options.paths["@api/*"], vec!["./src/api/*".to_string()]);
        assert_eq!(options.extra["noUnusedLocals"], serde_json::Value::Bool(true));
    }

    #[test]
    fn rejects_unknown_target() {
        let err = CompilerOptions::from_tsconfig_str(r#"{ "compilerOptions": { "target": "es1999" } }"#)
            .expect_err("unknown target");
        assert!(err.to_string().contains("es1999"));
    }

    #[test]
    fn enum_names_are_case_insensitive() {
        assert_eq!("ESNext".parse::<ScriptTarget>(), Ok(ScriptTarget::ESNext));
        assert_eq!("NodeNext".parse::<ModuleKind>(), Ok(ModuleKind::NodeNext));
        assert!(ModuleKind::Node16.is_commonjs());
        assert!(!ModuleKind::ESNext.is_commonjs());
    }

    #[test]
    fn class_field_semantics_follow_the_target() {
        let mut options = CompilerOptions::default();
        assert!(!options.use_define_for_class_fields());
        assert!(ScriptTarget::ES5 < ScriptTarget::ES2015);

        options.target = ScriptTarget::ES2022;
        assert!(options.use_define_for_class_fields());

        options
            .extra
            .insert("useDefineForClassFields".to_string(), serde_json::Value::Bool(false));
        assert!(!options.use_define_for_class_fields());
    }

    #[test]
    fn default_environment_pins_the_default_library() {
        let environment = HostEnvironment::default();
        assert_eq!(environment.default_lib_file_name, DEFAULT_LIB_FILE_NAME);
        assert_eq!(environment.ambient_declaration_suffix, ".d.ts");
    }
}
