//! Per-project configuration: loading, validation, and persistence.
//!
//! The on-disk format (`dependency_config.json`) is a loosely typed JSON
//! object — values may arrive as JSON numbers, booleans, or quoted
//! strings ("duck-typed", in the original's terms). [`RawConfig`] is that
//! untyped layer; [`Config`] is the normalized, strongly-typed value the
//! rest of the program actually uses. Coercion happens exactly once, at
//! load time, in [`Config::from_raw`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pathutil::normalize;

/// The recognized configuration keys. A fixed enum stands in for the
/// original's name-based dynamic validator dispatch: each variant maps to
/// exactly one validator function in [`ConfigKey::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    SleepTimer,
    DependencyPaths,
    DependencyDir,
    BuiltinLibs,
    SearchPaths,
    IncludeSource,
    UseIncompleteList,
}

impl ConfigKey {
    pub const ALL: &'static [ConfigKey] = &[
        ConfigKey::SleepTimer,
        ConfigKey::DependencyPaths,
        ConfigKey::DependencyDir,
        ConfigKey::BuiltinLibs,
        ConfigKey::SearchPaths,
        ConfigKey::IncludeSource,
        ConfigKey::UseIncompleteList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::SleepTimer => "sleep_timer",
            ConfigKey::DependencyPaths => "dependency_paths",
            ConfigKey::DependencyDir => "dependency_dir",
            ConfigKey::BuiltinLibs => "builtin_libs",
            ConfigKey::SearchPaths => "search_paths",
            ConfigKey::IncludeSource => "include_source",
            ConfigKey::UseIncompleteList => "use_incomplete_list",
        }
    }

    pub fn parse(name: &str) -> Option<ConfigKey> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Validates a coerced value against this key's constraints.
    fn validate(self, value: &CoercedValue) -> Result<(), ConfigError> {
        match self {
            ConfigKey::SleepTimer => match value {
                CoercedValue::Number(n) if *n >= 1.0 => Ok(()),
                CoercedValue::Number(_) => Err(ConfigError::OutOfRange {
                    key: self,
                    detail: "must be >= 1".into(),
                }),
                _ => Err(ConfigError::WrongType(self)),
            },
            ConfigKey::DependencyPaths
            | ConfigKey::BuiltinLibs
            | ConfigKey::IncludeSource
            | ConfigKey::UseIncompleteList => match value {
                CoercedValue::Bool(_) => Ok(()),
                _ => Err(ConfigError::WrongType(self)),
            },
            ConfigKey::DependencyDir | ConfigKey::SearchPaths => match value {
                CoercedValue::Text(_) => Ok(()),
                _ => Err(ConfigError::WrongType(self)),
            },
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug)]
enum CoercedValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

#[derive(Debug)]
pub enum ConfigError {
    WrongType(ConfigKey),
    OutOfRange { key: ConfigKey, detail: String },
    UnknownKey(String),
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::WrongType(k) => write!(f, "config key '{k}' has the wrong type"),
            ConfigError::OutOfRange { key, detail } => {
                write!(f, "config key '{key}' is out of range: {detail}")
            }
            ConfigError::UnknownKey(k) => write!(f, "unknown config key '{k}'"),
            ConfigError::Io(e) => write!(f, "{e}"),
            ConfigError::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Raw, untyped key/value view of `dependency_config.json`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawConfig(pub HashMap<String, Value>);

/// Normalized, strongly-typed configuration. The resolver and scan
/// controller only ever see this type, never raw JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub sleep_timer: u64,
    pub dependency_paths: bool,
    pub dependency_dir: String,
    pub builtin_libs: bool,
    pub search_paths: String,
    pub include_source: bool,
    pub use_incomplete_list: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sleep_timer: 5,
            dependency_paths: false,
            dependency_dir: String::new(),
            builtin_libs: false,
            search_paths: String::new(),
            include_source: false,
            use_incomplete_list: true,
        }
    }
}

impl Config {
    /// Loads and validates a config file, falling back to defaults for any
    /// key that is absent. Returns an error only if a present key fails
    /// coercion or validation. `dependency_dir` is resolved against
    /// `project_root` once here (see [`resolve_dependency_dir`]).
    pub fn load(path: &str, project_root: &str) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let raw: RawConfig = serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut cfg = Config::from_raw(raw)?;
        cfg.dependency_dir = resolve_dependency_dir(project_root, &cfg.dependency_dir);
        Ok(cfg)
    }

    /// Loads a config file if present, otherwise returns program defaults.
    /// `dependency_dir` is resolved against `project_root` either way.
    pub fn load_or_default(path: &str, project_root: &str) -> Result<Config, ConfigError> {
        if std::path::Path::new(path).is_file() {
            Config::load(path, project_root)
        } else {
            let mut cfg = Config::default();
            cfg.dependency_dir = resolve_dependency_dir(project_root, &cfg.dependency_dir);
            Ok(cfg)
        }
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Builds a normalized `Config` from a raw JSON object, coercing
    /// duck-typed values (quoted numbers/bools) and validating every key
    /// that is present. Absent keys take the compiled-in default.
    pub fn from_raw(raw: RawConfig) -> Result<Config, ConfigError> {
        let mut cfg = Config::default();

        for key in ConfigKey::ALL {
            let Some(value) = raw.0.get(key.name()) else {
                continue;
            };
            let coerced = coerce(value, *key)?;
            key.validate(&coerced)?;
            apply(&mut cfg, *key, coerced);
        }

        Ok(cfg)
    }

    /// Updates a single key by name, validating the new value before
    /// committing it. If the key is `dependency_dir`, the new value is
    /// resolved against `project_root` before being stored.
    pub fn set(&mut self, key_name: &str, raw_value: &str, project_root: &str) -> Result<(), ConfigError> {
        let key = ConfigKey::parse(key_name).ok_or_else(|| ConfigError::UnknownKey(key_name.to_string()))?;
        let coerced = coerce(&Value::String(raw_value.to_string()), key)?;
        key.validate(&coerced)?;
        apply(self, key, coerced);
        if key == ConfigKey::DependencyDir {
            self.dependency_dir = resolve_dependency_dir(project_root, &self.dependency_dir);
        }
        Ok(())
    }
}

/// Resolves `dependency_dir` against `project_root`, mirroring the
/// original's `preparePath`: an empty value is left empty (alongside the
/// source), `"."` becomes the project root itself, an already-absolute
/// path (`^[A-Za-z]:\`) is left as-is, and any other relative path is
/// joined onto the project root.
pub fn resolve_dependency_dir(project_root: &str, dependency_dir: &str) -> String {
    let dir = normalize(dependency_dir);
    if dir.is_empty() {
        return dir;
    }
    if is_absolute(&dir) {
        return dir;
    }
    let root = normalize(project_root);
    if dir == "." {
        return root;
    }
    normalize(&format!("{root}\\{dir}"))
}

fn is_absolute(p: &str) -> bool {
    let b = p.as_bytes();
    b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && b[2] == b'\\'
}

fn coerce(value: &Value, key: ConfigKey) -> Result<CoercedValue, ConfigError> {
    let wants_bool = matches!(
        key,
        ConfigKey::DependencyPaths | ConfigKey::BuiltinLibs | ConfigKey::IncludeSource | ConfigKey::UseIncompleteList
    );
    let wants_number = matches!(key, ConfigKey::SleepTimer);

    match value {
        Value::Bool(b) => Ok(CoercedValue::Bool(*b)),
        Value::Number(n) => Ok(CoercedValue::Number(n.as_f64().unwrap_or(0.0))),
        Value::String(s) => {
            let trimmed = s.trim();
            if wants_bool {
                match trimmed.to_ascii_lowercase().as_str() {
                    "true" => return Ok(CoercedValue::Bool(true)),
                    "false" => return Ok(CoercedValue::Bool(false)),
                    _ => return Err(ConfigError::WrongType(key)),
                }
            }
            if wants_number {
                return trimmed
                    .parse::<f64>()
                    .map(CoercedValue::Number)
                    .map_err(|_| ConfigError::WrongType(key));
            }
            Ok(CoercedValue::Text(trimmed.to_string()))
        }
        _ => Err(ConfigError::WrongType(key)),
    }
}

fn apply(cfg: &mut Config, key: ConfigKey, value: CoercedValue) {
    match (key, value) {
        (ConfigKey::SleepTimer, CoercedValue::Number(n)) => cfg.sleep_timer = n as u64,
        (ConfigKey::DependencyPaths, CoercedValue::Bool(b)) => cfg.dependency_paths = b,
        (ConfigKey::DependencyDir, CoercedValue::Text(t)) => cfg.dependency_dir = t,
        (ConfigKey::BuiltinLibs, CoercedValue::Bool(b)) => cfg.builtin_libs = b,
        (ConfigKey::SearchPaths, CoercedValue::Text(t)) => cfg.search_paths = t,
        (ConfigKey::IncludeSource, CoercedValue::Bool(b)) => cfg.include_source = b,
        (ConfigKey::UseIncompleteList, CoercedValue::Bool(b)) => cfg.use_incomplete_list = b,
        _ => unreachable!("validate() rejects mismatched key/value pairs before apply()"),
    }
}
