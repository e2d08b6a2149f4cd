//! Shared data-model types used across the resolver, scan controller, and
//! fragment I/O.

use std::collections::HashMap;
use std::time::SystemTime;

/// Snapshot of a project's files, rebuilt from scratch every scan cycle by
/// [`crate::pathutil::find_files`]. All three maps are keyed by basename.
#[derive(Debug, Default, Clone)]
pub struct ProjectIndex {
    /// Translation-unit roots (`.c`, `.cpp`).
    pub source: HashMap<String, String>,
    /// Headers (`.h`).
    pub relevant: HashMap<String, String>,
    /// Existing `.d` fragments.
    pub dependency: HashMap<String, String>,
    /// Path to `dependency_template.txt`, if found this cycle.
    pub template: Option<String>,
}

/// Failed-include ledger for one resolver run: absolute path -> set of
/// `#include` tokens that could not be resolved. An empty set means the
/// file itself could not be read.
pub type FailedFiles = HashMap<String, std::collections::HashSet<String>>;

/// Per-source ordered list of resolved absolute dependency paths, kept
/// across scan cycles by the scan controller.
pub type DependencyList = HashMap<String, Vec<String>>;

/// Per-source map of dependency path -> mtime at the last time the scan
/// controller checked it, used to avoid re-probing unchanged paths.
pub type CheckedMtimes = HashMap<String, HashMap<String, SystemTime>>;
