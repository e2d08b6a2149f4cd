//! Scan Controller: the periodic loop that rediscovers project files,
//! reconciles stale fragments, decides per source file whether to
//! re-resolve and/or re-emit its dependency fragment, and reconstructs
//! prior dependency lists from existing fragments on the first pass.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use crate::backparse::back_parse;
use crate::config::Config;
use crate::fragment;
use crate::pathutil::{self, basename, normalize, stem_ext};
use crate::resolver::Resolver;
use crate::searchpath::SearchPaths;
use crate::types::{CheckedMtimes, DependencyList, ProjectIndex};

const SOURCE_EXTS: [&str; 2] = ["c", "cpp"];
const SCAN_PATTERNS: [&str; 5] = ["*.h", "*.d", "dependency_template.txt", "*.c", "*.cpp"];

/// `Cold` is the state before one full pass has completed; existing
/// fragments are eligible for back-parse reconstruction and the
/// path-vs-basename projection of the template is re-probed. `Warm` is
/// every cycle after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Cold,
    Warm,
}

/// One source file's emit/skip outcome, surfaced to the caller for
/// logging instead of being printed directly by the controller.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Emitted { source: String, fragment: String },
    SkippedIncomplete { source: String, missing: Vec<String> },
    WriteFailed { source: String, fragment: String },
    Unchanged { source: String },
}

/// Summary of one `run_cycle` call.
#[derive(Debug, Clone)]
pub enum CycleReport {
    MissingTemplate,
    NoSources,
    Ran {
        removed_fragments: usize,
        outcomes: Vec<SourceOutcome>,
    },
}

pub struct ScanController {
    resolver: Resolver,
    search_paths: SearchPaths,
    search_paths_key: (bool, String),
    dependency_list: DependencyList,
    checked_mtimes: CheckedMtimes,
    state: ScanState,
}

impl ScanController {
    pub fn new(project_root: &str, config: &Config) -> ScanController {
        ScanController {
            resolver: Resolver::new(),
            search_paths: SearchPaths::build(project_root, config),
            search_paths_key: (config.builtin_libs, config.search_paths.clone()),
            dependency_list: HashMap::new(),
            checked_mtimes: HashMap::new(),
            state: ScanState::Cold,
        }
    }

    /// Rebuilds the search-path list and clears every resolver cache if
    /// the parts of `config` that feed [`SearchPaths::build`] changed
    /// since the list was last built.
    fn sync_search_paths(&mut self, project_root: &str, config: &Config) {
        let key = (config.builtin_libs, config.search_paths.clone());
        if key != self.search_paths_key {
            self.search_paths = SearchPaths::build(project_root, config);
            self.search_paths_key = key;
            self.resolver.clear_caches();
        }
    }

    /// Runs one populate/reconcile/decide/resolve/emit pass.
    pub fn run_cycle(&mut self, project_root: &str, config: &Config) -> CycleReport {
        self.sync_search_paths(project_root, config);

        let mut index = populate_index(project_root);
        let Some(template_path) = index.template.clone() else {
            return CycleReport::MissingTemplate;
        };
        if index.source.is_empty() {
            return CycleReport::NoSources;
        }

        let removed = reconcile(&mut index);
        purge_stale(&mut self.dependency_list, &removed);
        purge_stale(&mut self.checked_mtimes, &removed);

        if self.state == ScanState::Cold && self.dependency_list.is_empty() && !index.dependency.is_empty() {
            self.backfill_from_disk(&index, &template_path);
        }

        let template_text = pathutil::read_text(&template_path).unwrap_or_default();
        let template_mtime = pathutil::mtime(&template_path);

        let mut outcomes = Vec::new();
        let sources: Vec<(String, String)> = index.source.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (src_basename, src_path) in sources {
            let outcome = self.process_source(&src_basename, &src_path, &index, config, &template_text, template_mtime);
            outcomes.push(outcome);
        }

        self.state = ScanState::Warm;
        CycleReport::Ran {
            removed_fragments: removed.len(),
            outcomes,
        }
    }

    /// Reconstructs `dependency_list` entries from fragments already on
    /// disk, so the first real cycle can tell whether they already match
    /// current reality instead of treating every source as new.
    fn backfill_from_disk(&mut self, index: &ProjectIndex, template_path: &str) {
        let template_text = match pathutil::read_text(template_path) {
            Some(t) => t,
            None => return,
        };

        for (frag_basename, frag_path) in &index.dependency {
            let (stem, _) = stem_ext(frag_basename);
            let Some((src_basename, src_path)) = find_source_by_stem(index, stem) else {
                continue;
            };
            let Some(text) = pathutil::read_text(frag_path) else {
                continue;
            };
            if let Some(list) = back_parse(&template_text, &text, src_path) {
                self.dependency_list.insert(src_basename.to_string(), list);
            }
        }
    }

    fn process_source(
        &mut self,
        src_basename: &str,
        src_path: &str,
        index: &ProjectIndex,
        config: &Config,
        template_text: &str,
        template_mtime: Option<SystemTime>,
    ) -> SourceOutcome {
        let (stem, _) = stem_ext(src_basename);
        let fragment_basename = format!("{stem}.d");
        let fragment_path = index.dependency.get(&fragment_basename).cloned();
        let fragment_mtime = fragment_path.as_deref().and_then(pathutil::mtime);

        let mut generate = fragment_path.is_none();
        if let (Some(t), Some(f)) = (template_mtime, fragment_mtime) {
            if t > f {
                generate = true;
            }
        }

        let build_dep_list = self.needs_rebuild(src_basename, src_path, fragment_mtime, config, &mut generate);

        if !build_dep_list {
            return if generate {
                self.emit(src_path, self.dependency_list.get(src_basename).cloned().unwrap_or_default(), config, template_text)
            } else {
                SourceOutcome::Unchanged { source: src_basename.to_string() }
            };
        }

        let (new_deps, failures) = self.resolver.resolve(src_path, index, &self.search_paths, config);
        let has_unresolved = failures.values().any(|s| !s.is_empty()) || failures.keys().any(|k| k == src_path);

        if new_deps.is_empty() && has_unresolved && !config.use_incomplete_list {
            if let Some(old_list) = self.dependency_list.get(src_basename) {
                let entry = self.checked_mtimes.entry(src_basename.to_string()).or_default();
                for p in old_list {
                    if let Some(m) = pathutil::mtime(p) {
                        entry.insert(p.clone(), m);
                    }
                }
            }
            let missing: Vec<String> = failures.values().flat_map(|s| s.iter().cloned()).collect();
            return SourceOutcome::SkippedIncomplete { source: src_basename.to_string(), missing };
        }

        if !generate {
            generate = self.dep_list_changed(src_basename, &new_deps, fragment_mtime);
        }

        self.dependency_list.insert(src_basename.to_string(), new_deps.clone());

        if generate {
            self.emit(src_path, new_deps, config, template_text)
        } else {
            SourceOutcome::Unchanged { source: src_basename.to_string() }
        }
    }

    /// Decides whether a new dependency list must be resolved this cycle,
    /// and may itself flip `generate` to true (the first-iteration
    /// path-projection check operates on stored state alone, before any
    /// new list exists).
    fn needs_rebuild(
        &mut self,
        src_basename: &str,
        src_path: &str,
        fragment_mtime: Option<SystemTime>,
        config: &Config,
        generate: &mut bool,
    ) -> bool {
        let has_entry = self.dependency_list.contains_key(src_basename);

        if !has_entry {
            return true;
        }

        if self.state == ScanState::Cold {
            let stored_used_full_paths = self
                .dependency_list
                .get(src_basename)
                .and_then(|l| l.first())
                .map(|first| first.contains('\\'))
                .unwrap_or(false);
            if stored_used_full_paths != config.dependency_paths {
                *generate = true;
            }
            return true;
        }

        let src_mtime = pathutil::mtime(src_path);
        let checked_src_mtime = self.checked_mtimes.get(src_basename).and_then(|m| m.get(src_path)).copied();
        if let (Some(sm), Some(fm)) = (src_mtime, fragment_mtime) {
            let newer_than_checked = checked_src_mtime.map(|cm| sm > cm).unwrap_or(true);
            self.checked_mtimes.entry(src_basename.to_string()).or_default().insert(src_path.to_string(), sm);
            if sm > fm && newer_than_checked {
                return true;
            }
        }

        let old_list = self.dependency_list.get(src_basename).cloned().unwrap_or_default();
        let entry = self.checked_mtimes.entry(src_basename.to_string()).or_default();
        for p in &old_list {
            let exists = pathutil::is_file(p);
            if !exists {
                return true;
            }
            let mtime = pathutil::mtime(p);
            let checked = entry.get(p).copied();
            if let Some(m) = mtime {
                let stale = m > fragment_mtime.unwrap_or(SystemTime::UNIX_EPOCH) && checked.map(|c| m > c).unwrap_or(true);
                entry.insert(p.clone(), m);
                if stale {
                    return true;
                }
            }
        }

        false
    }

    /// Compares the freshly resolved list against the stored one to decide
    /// whether the fragment content actually needs rewriting.
    fn dep_list_changed(&self, src_basename: &str, new_deps: &[String], fragment_mtime: Option<SystemTime>) -> bool {
        let Some(old_list) = self.dependency_list.get(src_basename) else {
            return match fragment_mtime {
                Some(fm) => new_deps.iter().any(|p| pathutil::mtime(p).map(|m| m > fm).unwrap_or(false)),
                None => true,
            };
        };

        if old_list.len() != new_deps.len() {
            return true;
        }

        let stored_basenames_only = old_list.first().map(|s| !s.contains('\\')).unwrap_or(false);
        if stored_basenames_only {
            let old_set: HashSet<&str> = old_list.iter().map(|s| s.as_str()).collect();
            new_deps.iter().any(|p| !old_set.contains(basename(p).as_str()))
        } else {
            let old_set: HashSet<&String> = old_list.iter().collect();
            new_deps.iter().any(|p| !old_set.contains(p))
        }
    }

    fn emit(&self, src_path: &str, deps: Vec<String>, config: &Config, template_text: &str) -> SourceOutcome {
        let (path, ok) = fragment::write_fragment(template_text, src_path, &deps, config.dependency_paths, &config.dependency_dir);
        if ok {
            SourceOutcome::Emitted { source: basename(src_path), fragment: path }
        } else {
            SourceOutcome::WriteFailed { source: basename(src_path), fragment: path }
        }
    }
}

fn populate_index(root: &str) -> ProjectIndex {
    let found = pathutil::find_files(&SCAN_PATTERNS.map(String::from), root);
    let mut index = ProjectIndex::default();

    for (name, path) in found {
        if name.eq_ignore_ascii_case("dependency_template.txt") {
            index.template = Some(path);
            continue;
        }
        let (_, ext) = stem_ext(&name);
        match ext.to_ascii_lowercase().as_str() {
            "h" => {
                index.relevant.insert(name, path);
            }
            "d" => {
                index.dependency.insert(name, path);
            }
            "c" | "cpp" => {
                index.source.insert(name, path);
            }
            _ => {}
        }
    }

    index
}

/// Deletes every fragment whose stem has no corresponding source file,
/// returning the set of deleted fragment stems.
fn reconcile(index: &mut ProjectIndex) -> HashSet<String> {
    let mut removed = HashSet::new();
    let stale: Vec<String> = index
        .dependency
        .keys()
        .filter(|frag_name| {
            let (stem, _) = stem_ext(frag_name);
            find_source_by_stem(index, stem).is_none()
        })
        .cloned()
        .collect();

    for frag_name in stale {
        if let Some(path) = index.dependency.get(&frag_name) {
            pathutil::remove_file(path);
        }
        index.dependency.remove(&frag_name);
        let (stem, _) = stem_ext(&frag_name);
        removed.insert(stem.to_string());
    }

    removed
}

fn find_source_by_stem<'a>(index: &'a ProjectIndex, stem: &str) -> Option<(&'a str, &'a str)> {
    SOURCE_EXTS.iter().find_map(|ext| {
        let candidate = format!("{stem}.{ext}");
        index.source.get_key_value(&candidate).map(|(k, v)| (k.as_str(), v.as_str()))
    })
}

fn purge_stale<V>(map: &mut HashMap<String, V>, removed_stems: &HashSet<String>) {
    map.retain(|key, _| {
        let (stem, _) = stem_ext(key);
        !removed_stems.contains(stem)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &std::path::Path, rel: &str, content: &str) {
        let p = dir.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, content).unwrap();
    }

    #[test]
    fn single_self_contained_source_emits_basename_list() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.cpp", "#include \"b.h\"\n");
        write(dir.path(), "b.h", "");
        write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

        let root = dir.path().to_string_lossy().to_string();
        let mut config = Config::default();
        config.dependency_paths = false;
        config.include_source = false;

        let mut controller = ScanController::new(&root, &config);
        let report = controller.run_cycle(&root, &config);

        match report {
            CycleReport::Ran { outcomes, .. } => {
                assert_eq!(outcomes.len(), 1);
                assert!(matches!(outcomes[0], SourceOutcome::Emitted { .. }));
            }
            other => panic!("expected Ran, got {other:?}"),
        }

        let frag = fs::read_to_string(dir.path().join("a.d")).unwrap();
        assert_eq!(frag.trim(), "a.o: b.h");
    }

    #[test]
    fn second_cycle_over_unchanged_tree_emits_nothing() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.cpp", "#include \"b.h\"\n");
        write(dir.path(), "b.h", "");
        write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

        let root = dir.path().to_string_lossy().to_string();
        let config = Config::default();

        let mut controller = ScanController::new(&root, &config);
        controller.run_cycle(&root, &config);
        let report = controller.run_cycle(&root, &config);

        match report {
            CycleReport::Ran { outcomes, .. } => {
                assert!(outcomes.iter().all(|o| matches!(o, SourceOutcome::Unchanged { .. })));
            }
            other => panic!("expected Ran, got {other:?}"),
        }
    }

    #[test]
    fn missing_template_is_reported() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.cpp", "");
        let root = dir.path().to_string_lossy().to_string();
        let config = Config::default();
        let mut controller = ScanController::new(&root, &config);
        assert!(matches!(controller.run_cycle(&root, &config), CycleReport::MissingTemplate));
    }

    #[test]
    fn no_sources_is_reported() {
        let dir = tempdir().unwrap();
        write(dir.path(), "dependency_template.txt", "x");
        let root = dir.path().to_string_lossy().to_string();
        let config = Config::default();
        let mut controller = ScanController::new(&root, &config);
        assert!(matches!(controller.run_cycle(&root, &config), CycleReport::NoSources));
    }

    #[test]
    fn reconcile_deletes_orphaned_fragment() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.cpp", "");
        write(dir.path(), "b.d", "stale");
        write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

        let root = dir.path().to_string_lossy().to_string();
        let config = Config::default();
        let mut controller = ScanController::new(&root, &config);
        let report = controller.run_cycle(&root, &config);

        assert!(matches!(report, CycleReport::Ran { removed_fragments: 1, .. }));
        assert!(!dir.path().join("b.d").exists());
    }

    #[test]
    fn missing_include_strict_mode_skips_emit() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.cpp", "#include \"missing.h\"\n");
        write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

        let root = dir.path().to_string_lossy().to_string();
        let mut config = Config::default();
        config.use_incomplete_list = false;

        let mut controller = ScanController::new(&root, &config);
        let report = controller.run_cycle(&root, &config);

        match report {
            CycleReport::Ran { outcomes, .. } => {
                assert!(matches!(outcomes[0], SourceOutcome::SkippedIncomplete { .. }));
            }
            other => panic!("expected Ran, got {other:?}"),
        }
        assert!(!dir.path().join("a.d").exists());
    }

    #[test]
    fn missing_include_tolerant_mode_emits_empty_list() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.cpp", "#include \"missing.h\"\n");
        write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

        let root = dir.path().to_string_lossy().to_string();
        let mut config = Config::default();
        config.use_incomplete_list = true;

        let mut controller = ScanController::new(&root, &config);
        controller.run_cycle(&root, &config);

        let frag = fs::read_to_string(dir.path().join("a.d")).unwrap();
        assert_eq!(frag.trim(), "a.o:");
    }

    #[test]
    fn template_bump_reemits_byte_identical_fragment() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.cpp", "#include \"b.h\"\n");
        write(dir.path(), "b.h", "");
        write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

        let root = dir.path().to_string_lossy().to_string();
        let config = Config::default();
        let mut controller = ScanController::new(&root, &config);
        controller.run_cycle(&root, &config);
        let before = fs::read_to_string(dir.path().join("a.d")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

        let report = controller.run_cycle(&root, &config);
        let after = fs::read_to_string(dir.path().join("a.d")).unwrap();
        assert_eq!(before, after);
        match report {
            CycleReport::Ran { outcomes, .. } => assert!(matches!(outcomes[0], SourceOutcome::Emitted { .. })),
            other => panic!("expected Ran, got {other:?}"),
        }
    }

    #[test]
    fn full_paths_written_under_configured_dependency_dir() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/a.cpp", "#include \"b.h\"\n");
        write(dir.path(), "inc/b.h", "");
        write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");
        fs::create_dir_all(dir.path().join("dep")).unwrap();

        let root = dir.path().to_string_lossy().to_string();
        let mut config = Config::default();
        config.dependency_paths = true;
        config.dependency_dir = normalize(&dir.path().join("dep").to_string_lossy());

        let mut controller = ScanController::new(&root, &config);
        controller.run_cycle(&root, &config);

        let frag = fs::read_to_string(dir.path().join("dep").join("a.d")).unwrap();
        assert!(frag.contains("inc/b.h"));
    }
}
