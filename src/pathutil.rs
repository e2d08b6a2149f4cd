//! Path normalization, file discovery, and plain-text I/O.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Normalizes a path string to the program's canonical form: `/` becomes
/// `\`, and a single leading or trailing `\` is stripped. Idempotent.
pub fn normalize(p: &str) -> String {
    let mut s = p.replace('/', "\\");
    if let Some(rest) = s.strip_prefix('\\') {
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_suffix('\\') {
        s = rest.to_string();
    }
    s
}

/// Reads `path` as UTF-8 text, returning `None` on any failure.
pub fn read_text(path: &str) -> Option<String> {
    fs::read_to_string(path).ok()
}

/// Writes `content` to `path`, creating or truncating it. Returns `false`
/// on any failure instead of propagating an error.
pub fn write_text(path: &str, content: &str) -> bool {
    fs::write(path, content).is_ok()
}

/// Recursively searches `root` for files matching `patterns`.
///
/// A pattern is either a literal basename (`"dependency_template.txt"`) or
/// a wildcard extension (`"*.h"`). Literal matches remove the pattern from
/// the working set once satisfied; wildcard matches never do. The walk
/// stops early once the working set is empty. Returns basename -> absolute
/// normalized path; when two files share a basename, the last one visited
/// wins (matching the depth-first, pop-ordered traversal this is ported
/// from).
pub fn find_files(patterns: &[String], root: &str) -> HashMap<String, String> {
    let mut remaining: Vec<String> = patterns.to_vec();
    let mut out = HashMap::new();
    find_files_inner(&mut remaining, Path::new(root), &mut out);
    out
}

fn find_files_inner(remaining: &mut Vec<String>, dir: &Path, out: &mut HashMap<String, String>) {
    if remaining.is_empty() || !dir.is_dir() {
        return;
    }

    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    let mut subdirs = Vec::new();

    for entry in entries.flatten() {
        if remaining.is_empty() {
            break;
        }

        let path = entry.path();
        let basename = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };

        if path.is_file() {
            let extension = match basename.rfind('.') {
                Some(i) => &basename[i + 1..],
                None => "",
            };
            let wildcard = format!("*.{extension}");

            if let Some(pos) = remaining.iter().position(|p| p == &basename) {
                out.insert(basename.clone(), normalize(&path.to_string_lossy()));
                remaining.remove(pos);
            } else if remaining.iter().any(|p| p == &wildcard) {
                out.insert(basename.clone(), normalize(&path.to_string_lossy()));
            }
        } else if path.is_dir() {
            subdirs.push(path);
        }
    }

    for subdir in subdirs {
        if remaining.is_empty() {
            break;
        }
        find_files_inner(remaining, &subdir, out);
    }
}

/// Returns the basename (final path component) of a normalized path.
pub fn basename(path: &str) -> String {
    PathBuf::from(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Returns the directory portion of a normalized path, or the path itself
/// if it has no parent component.
pub fn dirname(path: &str) -> String {
    match path.rfind('\\') {
        Some(i) => path[..i].to_string(),
        None => String::new(),
    }
}

/// Splits `basename` into (stem, extension). Extension is empty if there
/// is no `.` in the name.
pub fn stem_ext(basename: &str) -> (&str, &str) {
    match basename.rfind('.') {
        Some(i) => (&basename[..i], &basename[i + 1..]),
        None => (basename, ""),
    }
}

/// Returns a file's modification time, or `None` if it cannot be stat'd.
pub fn mtime(path: &str) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// True if `path` points to a regular, existing file.
pub fn is_file(path: &str) -> bool {
    Path::new(path).is_file()
}

/// Deletes a file, ignoring the outcome (the reconcile step treats a
/// failed delete the same as a fragment that will be caught next cycle).
pub fn remove_file(path: &str) -> bool {
    fs::remove_file(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn normalize_replaces_slashes_and_strips_edges() {
        assert_eq!(normalize("/a/b/c/"), "a\\b\\c");
        assert_eq!(normalize("a\\b"), "a\\b");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("/a/b/c/");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn find_files_literal_is_consumed_but_wildcard_is_not() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.cpp"), "").unwrap();
        fs::write(dir.path().join("b.cpp"), "").unwrap();
        fs::write(dir.path().join("dependency_template.txt"), "").unwrap();

        let patterns = vec!["*.cpp".to_string(), "dependency_template.txt".to_string()];
        let found = find_files(&patterns, &dir.path().to_string_lossy());

        assert!(found.contains_key("a.cpp"));
        assert!(found.contains_key("b.cpp"));
        assert!(found.contains_key("dependency_template.txt"));
    }

    #[test]
    fn find_files_recurses_into_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("inc")).unwrap();
        fs::write(dir.path().join("inc").join("b.h"), "").unwrap();

        let patterns = vec!["*.h".to_string()];
        let found = find_files(&patterns, &dir.path().to_string_lossy());
        assert!(found.contains_key("b.h"));
    }

    #[test]
    fn stem_ext_splits_on_last_dot() {
        assert_eq!(stem_ext("foo.cpp"), ("foo", "cpp"));
        assert_eq!(stem_ext("noext"), ("noext", ""));
    }
}
