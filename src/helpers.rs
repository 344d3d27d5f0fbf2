//! Path and text helpers for the virtual filesystem.
//!
//! Virtual paths are plain strings: forward slashes, no drive letters, no
//! leading `./`. Every lookup goes through [`canonical`] first.

/// Normalizes path separators so lookups are separator-insensitive.
pub fn canonical(path: &str) -> String {
    path.replace('\\', "/")
}

/// Collapses `.` and `..` segments and strips leading `./` and `/`.
pub fn normalize_path(path: &str) -> String {
    let path = canonical(path);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Directory part of a virtual path, `""` for top-level files.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

pub fn join(dir: &str, relative: &str) -> String {
    if dir.is_empty() {
        normalize_path(relative)
    } else {
        normalize_path(&format!("{dir}/{relative}"))
    }
}

pub fn is_declaration_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".d.ts") || lower.ends_with(".d.mts") || lower.ends_with(".d.cts")
}

pub fn is_javascript_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    [".js", ".jsx", ".mjs", ".cjs"].iter().any(|ext| lower.ends_with(ext))
}

/// The path an emitted file is written to, or `None` when the file is not emitted.
pub fn output_file_name(path: &str, allow_js: bool) -> Option<String> {
    if is_declaration_file(path) {
        return None;
    }
    let (stem, ext) = path.rsplit_once('.')?;
    let out_ext = match ext.to_ascii_lowercase().as_str() {
        "ts" => "js",
        "tsx" => "jsx",
        "mts" => "mjs",
        "cts" => "cjs",
        "js" | "jsx" | "mjs" | "cjs" if allow_js => return Some(path.to_string()),
        _ => return None,
    };
    Some(format!("{stem}.{out_ext}"))
}

/// 1-based line and 1-based byte column of a byte offset.
pub fn line_column_of(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let line_start = before.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
    (line, offset - line_start + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_replaces_backslashes() {
        assert_eq!(canonical("src\\api\\index.ts"), "src/api/index.ts");
    }

    #[test]
    fn normalize_collapses_relative_segments() {
        assert_eq!(normalize_path("./src/api/../main.ts"), "src/main.ts");
        assert_eq!(normalize_path("/node_modules/typia/lib/index.d.ts"), "node_modules/typia/lib/index.d.ts");
        assert_eq!(normalize_path("../outside.ts"), "../outside.ts");
    }

    #[test]
    fn join_resolves_against_directory() {
        assert_eq!(join("src", "./api/structures/ISomething"), "src/api/structures/ISomething");
        assert_eq!(join("", "./b"), "b");
        assert_eq!(join("src/api", "../main"), "src/main");
    }

    #[test]
    fn output_names_follow_extension_rules() {
        assert_eq!(output_file_name("a.ts", false).as_deref(), Some("a.js"));
        assert_eq!(output_file_name("src/view.tsx", false).as_deref(), Some("src/view.jsx"));
        assert_eq!(output_file_name("src/lib.mts", false).as_deref(), Some("src/lib.mjs"));
        assert_eq!(output_file_name("types.d.ts", false), None);
        assert_eq!(output_file_name("legacy.js", false), None);
        assert_eq!(output_file_name("legacy.js", true).as_deref(), Some("legacy.js"));
    }

    #[test]
    fn line_column_is_one_based() {
        let source = "line1\nline2\nline3";
        assert_eq!(line_column_of(source, 0), (1, 1));
        assert_eq!(line_column_of(source, 8), (2, 3));
        assert_eq!(line_column_of(source, source.len()), (3, 6));
    }
}
