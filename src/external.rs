//! Builds an ExternalSet snapshot from an npm-installed dependency directory.

use crate::config::{AMBIENT_DECLARATION_SUFFIX, ExternalSet};
use crate::error::EmbedError;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

const NODE_MODULES: &str = "node_modules";
pub const PACKAGE_LOCK: &str = "package-lock.json";
const PACKAGE_JSON: &str = "package.json";

#[derive(Debug, Deserialize)]
struct PackageLock {
    #[serde(default)]
    packages: BTreeMap<String, serde_json::Value>,
}

/// Installed packages listed in the lockfile, relative to `node_modules/`.
pub fn read_dependencies(input: &Path) -> Result<Vec<String>> {
    let path = input.join(PACKAGE_LOCK);
    let text = fs::read_to_string(&path).with_context(|| format!("Could not read {}", path.display()))?;
    let lock: PackageLock = serde_json::from_str(&text)
        .map_err(|error| EmbedError::ExternalSnapshot(format!("{}: {error}", path.display())))?;
    let prefix = format!("{NODE_MODULES}/");
    Ok(lock
        .packages
        .keys()
        .filter_map(|key| key.strip_prefix(&prefix))
        .map(str::to_string)
        .collect())
}

fn collect_package(library: &str, root: &Path) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    iterate(library, root, root, &mut files)?;
    Ok(files)
}

fn iterate(library: &str, root: &Path, location: &Path, files: &mut Vec<(String, String)>) -> Result<()> {
    let mut entries = fs::read_dir(location)
        .with_context(|| format!("Could not read directory {}", location.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<PathBuf>>>()?;
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if path.is_dir() {
            if name == NODE_MODULES {
                collect_nested(&path, files)?;
            } else {
                iterate(library, root, &path, files)?;
            }
        } else if name.ends_with(AMBIENT_DECLARATION_SUFFIX) || (location == root && name == PACKAGE_JSON) {
            let relative = path
                .strip_prefix(root)
                .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
            let relative = relative.to_string_lossy().replace('\\', "/");
            let text = fs::read_to_string(&path).with_context(|| format!("Could not read {}", path.display()))?;
            files.push((format!("{NODE_MODULES}/{library}/{relative}"), text));
        }
    }
    Ok(())
}

/// A package that carries private copies of its dependencies.
fn collect_nested(node_modules: &Path, files: &mut Vec<(String, String)>) -> Result<()> {
    let mut entries = fs::read_dir(node_modules)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<PathBuf>>>()?;
    entries.sort();

    for nested in entries {
        if !nested.is_dir() || !nested.join(PACKAGE_JSON).exists() {
            continue;
        }
        let Some(library) = nested.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        log::debug!("Collecting nested package {library} in {}", node_modules.display());
        files.extend(collect_package(library, &nested)?);
    }
    Ok(())
}

fn progress_bar(total: usize, show_progress: bool) -> Result<ProgressBar> {
    if !show_progress {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(ProgressStyle::with_template("  {spinner:.cyan} {wide_msg}  {bar:40.cyan/blue}  {pos}/{len}")?.progress_chars("#>-"));
    Ok(bar)
}

/// Collects the declaration files and root manifests of every locked package.
pub fn collect(input: &Path, show_progress: bool) -> Result<ExternalSet> {
    let dependencies = read_dependencies(input)?;
    let bar = progress_bar(dependencies.len(), show_progress)?;
    bar.set_message("Collecting packages");

    let packages = dependencies
        .par_iter()
        .map(|library| {
            let root = input.join(NODE_MODULES).join(library);
            let files = if root.is_dir() {
                collect_package(library, &root)
            } else {
                log::debug!("Skipping {library}: not installed");
                Ok(vec![])
            };
            bar.inc(1);
            files
        })
        .collect::<Result<Vec<_>>>()?;
    bar.finish_and_clear();

    Ok(packages.into_iter().flatten().collect())
}

/// Writes a snapshot as pretty-printed JSON, creating parent directories.
pub fn write(container: &ExternalSet, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("Could not create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(container)?;
    fs::write(output, json).with_context(|| format!("Could not write {}", output.display()))?;
    Ok(())
}

/// Collects `input` and writes the snapshot to `output`. Returns the number of files.
pub fn execute(input: &Path, output: &Path, show_progress: bool) -> Result<usize> {
    let timing = Instant::now();
    let container = collect(input, show_progress)?;
    write(&container, output)?;
    log::info!(
        "Wrote {} files to {} in {:.2}s",
        container.len(),
        output.display(),
        timing.elapsed().as_secs_f64()
    );
    Ok(container.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_file(root: &Path, relative: &str, text: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write_file(
            root,
            PACKAGE_LOCK,
            r#"{
  "name": "deps",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "deps" },
    "node_modules/typia": { "version": "1.0.0" },
    "node_modules/@types/node": { "version": "20.0.0" },
    "node_modules/missing": { "version": "0.1.0" }
  }
}"#,
        );
        write_file(root, "node_modules/typia/package.json", r#"{"types":"lib/index.d.ts"}"#);
        write_file(root, "node_modules/typia/lib/index.d.ts", "export declare function is<T>(input: unknown): input is T;");
        write_file(root, "node_modules/typia/lib/index.js", "exports.is = () => true;");
        write_file(root, "node_modules/typia/lib/package.json", "{}");
        write_file(root, "node_modules/typia/node_modules/inner/package.json", "{}");
        write_file(root, "node_modules/typia/node_modules/inner/index.d.ts", "export declare const inner: 1;");
        write_file(root, "node_modules/typia/node_modules/.bin/tool", "#!/bin/sh");
        write_file(root, "node_modules/@types/node/package.json", "{}");
        write_file(root, "node_modules/@types/node/fs.d.ts", "declare module \"fs\" {}");
        dir
    }

    #[test]
    fn reads_locked_packages() {
        let dir = fixture();
        assert_eq!(
            read_dependencies(dir.path()).unwrap(),
            vec!["@types/node", "missing", "typia"]
        );
    }

    #[test]
    fn collects_declarations_and_root_manifests() {
        let dir = fixture();
        let container = collect(dir.path(), false).unwrap();
        assert_eq!(
            container.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![
                "node_modules/@types/node/fs.d.ts",
                "node_modules/@types/node/package.json",
                "node_modules/inner/index.d.ts",
                "node_modules/inner/package.json",
                "node_modules/typia/lib/index.d.ts",
                "node_modules/typia/package.json",
            ]
        );
        assert_eq!(container["node_modules/inner/index.d.ts"], "export declare const inner: 1;");
    }

    #[test]
    fn writes_pretty_json_into_new_directories() {
        let dir = fixture();
        let output = dir.path().join("out/nested/external.json");
        let count = execute(dir.path(), &output, false).unwrap();

        let written: ExternalSet = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(count, 6);
        assert_eq!(written.len(), 6);
        assert!(fs::read_to_string(&output).unwrap().starts_with("{\n  \""));
    }

    #[test]
    fn invalid_lockfile_is_a_snapshot_error() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), PACKAGE_LOCK, "not json");
        let error = read_dependencies(dir.path()).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<EmbedError>(),
            Some(EmbedError::ExternalSnapshot(_))
        ));
    }
}
