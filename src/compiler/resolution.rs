use super::host::CompilerHost;
use crate::config::CompilerOptions;
use crate::helpers;
use ahash::AHashSet;

/// Where an import specifier points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A concrete file in the virtual filesystem.
    File(String),
    /// A `declare module "name"` block somewhere in the program.
    Ambient(String),
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// Resolves `specifier` imported from `containing_file`.
pub fn resolve_module_name(
    specifier: &str,
    containing_file: &str,
    options: &CompilerOptions,
    host: &dyn CompilerHost,
    ambient_modules: &AHashSet<String>,
) -> Option<Resolution> {
    let containing_dir = helpers::dirname(containing_file);

    if is_relative(specifier) {
        let candidate = helpers::join(containing_dir, specifier);
        return load_file_or_directory(&candidate, options, host).map(Resolution::File);
    }

    if ambient_modules.contains(specifier) {
        return Some(Resolution::Ambient(specifier.to_string()));
    }

    resolve_path_alias(specifier, options, host)
        .or_else(|| resolve_node_modules(specifier, containing_dir, options, host))
        .map(Resolution::File)
}

/// Applies `compilerOptions.paths`: exact patterns first, then the single-`*`
/// pattern with the longest prefix.
fn resolve_path_alias(specifier: &str, options: &CompilerOptions, host: &dyn CompilerHost) -> Option<String> {
    if options.paths.is_empty() {
        return None;
    }
    let base_url = options.base_url.as_deref().unwrap_or(".");

    let mut matched: Option<(&str, &[String])> = None;
    let mut longest_prefix = 0;
    for (pattern, substitutions) in &options.paths {
        if pattern == specifier {
            matched = Some(("", substitutions.as_slice()));
            break;
        }
        if let Some((prefix, suffix)) = pattern.split_once('*') {
            if specifier.len() >= prefix.len() + suffix.len()
                && specifier.starts_with(prefix)
                && specifier.ends_with(suffix)
                && prefix.len() >= longest_prefix
            {
                longest_prefix = prefix.len();
                let captured = &specifier[prefix.len()..specifier.len() - suffix.len()];
                matched = Some((captured, substitutions.as_slice()));
            }
        }
    }

    let (captured, substitutions) = matched?;
    substitutions.iter().find_map(|substitution| {
        let target = substitution.replacen('*', captured, 1);
        let candidate = helpers::join(&helpers::normalize_path(base_url), &target);
        load_file_or_directory(&candidate, options, host)
    })
}

/// Walks up from the importing directory through `node_modules` and `node_modules/@types`.
fn resolve_node_modules(
    specifier: &str,
    containing_dir: &str,
    options: &CompilerOptions,
    host: &dyn CompilerHost,
) -> Option<String> {
    let types_name = types_package_name(specifier);
    let mut dir = helpers::normalize_path(containing_dir);
    loop {
        let node_modules = if dir.is_empty() {
            "node_modules".to_string()
        } else {
            format!("{dir}/node_modules")
        };
        let found = load_file_or_directory(&format!("{node_modules}/{specifier}"), options, host).or_else(|| {
            load_file_or_directory(&format!("{node_modules}/@types/{types_name}"), options, host)
        });
        if found.is_some() {
            return found;
        }
        if dir.is_empty() {
            return None;
        }
        dir = helpers::dirname(&dir).to_string();
    }
}

/// `@scope/pkg/sub` → `scope__pkg/sub`, the layout of DefinitelyTyped packages.
fn types_package_name(specifier: &str) -> String {
    match specifier.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
        Some((scope, rest)) => format!("{scope}__{rest}"),
        None => specifier.to_string(),
    }
}

fn load_file_or_directory(candidate: &str, options: &CompilerOptions, host: &dyn CompilerHost) -> Option<String> {
    load_file(candidate, options, host).or_else(|| load_directory(candidate, options, host))
}

fn extensions(options: &CompilerOptions) -> Vec<&'static str> {
    let mut extensions = vec![".ts", ".tsx", ".d.ts"];
    if options.allow_js {
        extensions.extend([".js", ".jsx"]);
    }
    extensions
}

fn find_file(path: &str, host: &dyn CompilerHost) -> Option<String> {
    host.file_exists(path).then(|| host.get_canonical_file_name(path))
}

fn load_file(candidate: &str, options: &CompilerOptions, host: &dyn CompilerHost) -> Option<String> {
    let lower = candidate.to_ascii_lowercase();
    let is_typescript = [".ts", ".tsx", ".mts", ".cts"].iter().any(|ext| lower.ends_with(ext));
    if is_typescript || (options.allow_js && helpers::is_javascript_file(&lower)) {
        if let Some(found) = find_file(candidate, host) {
            return Some(found);
        }
    }

    // `./b.js` written for the emitted layout refers to `./b.ts` on input.
    for (js, ts) in [(".js", [".ts", ".tsx", ".d.ts"]), (".jsx", [".tsx", ".ts", ".d.ts"])] {
        if lower.ends_with(js) {
            let stem = &candidate[..candidate.len() - js.len()];
            if let Some(found) = ts.iter().find_map(|ext| find_file(&format!("{stem}{ext}"), host)) {
                return Some(found);
            }
        }
    }
    for (js, ts) in [(".mjs", [".mts", ".d.mts"]), (".cjs", [".cts", ".d.cts"])] {
        if lower.ends_with(js) {
            let stem = &candidate[..candidate.len() - js.len()];
            if let Some(found) = ts.iter().find_map(|ext| find_file(&format!("{stem}{ext}"), host)) {
                return Some(found);
            }
        }
    }

    extensions(options)
        .into_iter()
        .find_map(|ext| find_file(&format!("{candidate}{ext}"), host))
}

fn load_directory(candidate: &str, options: &CompilerOptions, host: &dyn CompilerHost) -> Option<String> {
    let manifest_path = format!("{candidate}/package.json");
    if let Some(manifest) = host.read_file(&manifest_path) {
        match serde_json::from_str::<serde_json::Value>(&manifest) {
            Ok(manifest) => {
                for field in ["types", "typings", "main"] {
                    if let Some(entry) = manifest.get(field).and_then(|value| value.as_str()) {
                        let entry = helpers::join(candidate, entry);
                        let found = load_file(&entry, options, host).or_else(|| {
                            extensions(options)
                                .into_iter()
                                .find_map(|ext| find_file(&format!("{entry}/index{ext}"), host))
                        });
                        if found.is_some() {
                            return found;
                        }
                    }
                }
            }
            Err(e) => log::debug!("Could not read {manifest_path}: {e}"),
        }
    }

    extensions(options)
        .into_iter()
        .find_map(|ext| find_file(&format!("{candidate}/index{ext}"), host))
}
