//! Dependency-dir relocation: moving existing `.d` fragments and the
//! project config file when `dependency_dir` changes, so they don't end
//! up stranded in the old location.
//!
//! Grounded in `original_source/classes/Application.py`'s `moveDepFiles`,
//! `moveProjConfigFile`, and `buildProjConfigPath` — the Python original
//! relocates files imperatively against its singleton `self.config` and
//! `self.files`; here the project root, old directory, and new directory
//! are explicit arguments instead.

use std::fs;

use crate::pathutil::{self, dirname, normalize, stem_ext};

const SOURCE_EXTS: [&str; 2] = ["c", "cpp"];

/// The directory a fragment with the given source basename should live
/// in, given the `dependency_dir` config value: alongside the source
/// (when empty) or the configured directory. `dependency_dir` must
/// already be resolved against the project root (see
/// [`crate::config::resolve_dependency_dir`]); this function does not
/// interpret relative paths itself.
fn target_dir_for(source_dir: &str, dependency_dir: &str) -> String {
    if dependency_dir.is_empty() {
        source_dir.to_string()
    } else {
        dependency_dir.to_string()
    }
}

/// Moves every `.d` fragment found under `project_root` into the
/// directory implied by `new_dependency_dir`, mirroring `moveDepFiles`.
/// A fragment whose stem has no matching source file is left alone —
/// reconcile (see [`crate::scan`]) is responsible for deleting those.
///
/// Returns the basenames of fragments that were actually moved.
pub fn relocate_fragments(project_root: &str, new_dependency_dir: &str) -> Vec<String> {
    let patterns = vec!["*.d".to_string(), "*.c".to_string(), "*.cpp".to_string()];
    let found = pathutil::find_files(&patterns, project_root);

    let mut sources = std::collections::HashMap::new();
    let mut fragments = std::collections::HashMap::new();
    for (name, path) in found {
        let (_, ext) = stem_ext(&name);
        if ext.eq_ignore_ascii_case("d") {
            fragments.insert(name, path);
        } else if SOURCE_EXTS.iter().any(|e| ext.eq_ignore_ascii_case(e)) {
            sources.insert(name, path);
        }
    }

    let mut moved = Vec::new();
    for (frag_basename, frag_path) in fragments {
        let (stem, _) = stem_ext(&frag_basename);
        let Some(src_path) = SOURCE_EXTS.iter().find_map(|ext| sources.get(&format!("{stem}.{ext}"))) else {
            continue;
        };

        let target_dir = target_dir_for(&dirname(src_path), new_dependency_dir);
        let new_path = normalize(&format!("{target_dir}\\{frag_basename}"));

        if dirname(&frag_path) == target_dir {
            continue;
        }

        if move_file(&frag_path, &new_path) {
            moved.push(frag_basename);
        }
    }

    moved
}

/// Returns where `dependency_config.json` should live for the given
/// `dependency_dir` value, mirroring `buildProjConfigPath`. As with
/// [`target_dir_for`], `dependency_dir` must already be resolved against
/// `project_root`.
pub fn config_target_path(project_root: &str, dependency_dir: &str) -> String {
    let dir = if dependency_dir.is_empty() { project_root } else { dependency_dir };
    normalize(&format!("{dir}\\dependency_config.json"))
}

/// Moves the project config file to the directory implied by
/// `new_dependency_dir` if it isn't already there, mirroring
/// `moveProjConfigFile`. Returns `true` if a move happened, `false` if
/// no move was needed or the move failed.
pub fn relocate_config(current_path: &str, project_root: &str, new_dependency_dir: &str) -> bool {
    if !pathutil::is_file(current_path) {
        return false;
    }

    let target = config_target_path(project_root, new_dependency_dir);
    if normalize(current_path) == target {
        return false;
    }

    move_file(current_path, &target)
}

/// Copies `from` to `to` and removes the original. `fs::rename` isn't
/// used because the source and destination may be on different mount
/// points; basename doesn't change, only the containing directory.
fn move_file(from: &str, to: &str) -> bool {
    if let Some(parent) = std::path::Path::new(to).parent() {
        if fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    match fs::copy(from, to) {
        Ok(_) => pathutil::remove_file(from),
        Err(_) => false,
    }
}
