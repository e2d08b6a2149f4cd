//! Fragment Writer: template substitution and `.d` file emission.

use crate::pathutil::{self, basename, dirname, normalize, stem_ext};

pub const PLACEHOLDER_DEPENDENTS: &str = "|!dependents!|";
pub const PLACEHOLDER_BASENAME: &str = "|!src_file_basename!|";
pub const PLACEHOLDER_NAME: &str = "|!src_file_name!|";
pub const PLACEHOLDER_EXT: &str = "|!src_file_ext!|";

/// Formats a dependency list for embedding in a fragment: full makefile-
/// friendly paths (`\` -> `/`) when `dependency_paths` is true, otherwise
/// bare basenames. Always whitespace-joined and trimmed.
pub fn format_dep_list(deps: &[String], dependency_paths: bool) -> String {
    let parts: Vec<String> = if dependency_paths {
        deps.iter().map(|d| d.replace('\\', "/")).collect()
    } else {
        deps.iter().map(|d| basename(d)).collect()
    };
    parts.join(" ").trim().to_string()
}

/// Substitutes the four placeholders in `template` for one source file.
pub fn render(template: &str, src_path: &str, deps: &[String], dependency_paths: bool) -> String {
    let src_basename = basename(src_path);
    let (stem, ext) = stem_ext(&src_basename);
    let dependents = format_dep_list(deps, dependency_paths);

    template
        .replace(PLACEHOLDER_DEPENDENTS, &dependents)
        .replace(PLACEHOLDER_BASENAME, &src_basename)
        .replace(PLACEHOLDER_NAME, stem)
        .replace(PLACEHOLDER_EXT, ext)
}

/// Computes the output path for a source file's fragment: `<stem>.d` in
/// `dependency_dir` if non-empty, otherwise alongside the source.
/// `dependency_dir` must already be resolved against the project root
/// (see [`crate::config::resolve_dependency_dir`]) — this function uses
/// it verbatim and does not itself interpret relative paths.
pub fn output_path(src_path: &str, dependency_dir: &str) -> String {
    let src_basename = basename(src_path);
    let (stem, _ext) = stem_ext(&src_basename);
    let dir = if dependency_dir.is_empty() {
        dirname(src_path)
    } else {
        dependency_dir.to_string()
    };
    normalize(&format!("{dir}\\{stem}.d"))
}

/// Renders and writes one fragment. Returns `true` on success.
pub fn write_fragment(template: &str, src_path: &str, deps: &[String], dependency_paths: bool, dependency_dir: &str) -> (String, bool) {
    let path = output_path(src_path, dependency_dir);
    let content = render(template, src_path, deps, dependency_paths);
    let ok = pathutil::write_text(&path, &content);
    (path, ok)
}
