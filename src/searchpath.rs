//! Builds the ordered list of directories the resolver searches when a
//! bare include token cannot be found relative to its including file or
//! in the project index.

use regex::Regex;

use crate::config::Config;
use crate::pathutil::normalize;

/// Ordered search list. Slot 0 is always the project root and is never
/// removed; callers that rebuild this list must also clear the
/// resolver's `KnownPaths`/`FileKnownDeps`/`FileUnknownDeps`/`CrawlMtime`
/// caches, since cached resolutions may no longer be reachable under the
/// new order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPaths(pub Vec<String>);

impl SearchPaths {
    /// Builds the search list from `project_root` and `config`: the root,
    /// then each `;`-separated entry of `config.search_paths` in order,
    /// then — if `builtin_libs` is enabled — any `mingw` toolchain
    /// directories found in the process `PATH`.
    pub fn build(project_root: &str, config: &Config) -> SearchPaths {
        let mut paths = vec![normalize(project_root)];

        for entry in config.search_paths.split(';') {
            let entry = entry.trim();
            if !entry.is_empty() {
                paths.push(normalize(entry));
            }
        }

        if config.builtin_libs {
            if let Ok(path_var) = std::env::var("PATH") {
                paths.extend(mingw_dirs(&path_var));
            }
        }

        SearchPaths(paths)
    }
}

/// Extracts `mingw` toolchain directories from a `PATH`-style string,
/// case-insensitively, matching `(([^\/;]+[\/])+mingw([\/][^\/;]+)?)`.
fn mingw_dirs(path_var: &str) -> Vec<String> {
    // Fixed default; not yet exposed as a config knob.
    let re = Regex::new(r"(?i)(([^\\/;]+[\\/])+mingw([\\/][^\\/;]+)?)").unwrap();
    re.find_iter(path_var).map(|m| normalize(m.as_str())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_always_slot_zero() {
        let cfg = Config::default();
        let sp = SearchPaths::build("C:\\proj", &cfg);
        assert_eq!(sp.0[0], "C:\\proj");
    }

    #[test]
    fn configured_paths_follow_root_in_order() {
        let mut cfg = Config::default();
        cfg.search_paths = "C:\\inc;C:\\lib".to_string();
        let sp = SearchPaths::build("C:\\proj", &cfg);
        assert_eq!(sp.0, vec!["C:\\proj", "C:\\inc", "C:\\lib"]);
    }

    #[test]
    fn mingw_dirs_extracted_case_insensitively() {
        let hits = mingw_dirs("C:\\foo\\MinGW\\include;C:\\other\\bin");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].to_lowercase().contains("mingw"));
    }

    #[test]
    fn builtin_libs_disabled_skips_path_scrape() {
        let cfg = Config::default();
        let sp = SearchPaths::build("C:\\proj", &cfg);
        assert_eq!(sp.0.len(), 1);
    }
}
