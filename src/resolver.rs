//! Include Resolver: given one source file, crawls its transitive
//! `#include` closure and returns the ordered list of absolute dependency
//! paths, plus a ledger of anything that could not be resolved.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::SystemTime;

use regex::{Regex, RegexBuilder};

use crate::config::Config;
use crate::pathutil::{self, basename, dirname, normalize};
use crate::searchpath::SearchPaths;
use crate::types::{FailedFiles, ProjectIndex};

/// Caches owned exclusively by the resolver, persisted across scan
/// cycles. Cleared in full whenever [`SearchPaths`] is rebuilt.
#[derive(Debug, Default)]
pub struct ResolverCaches {
    known_paths: HashMap<String, String>,
    file_known_deps: HashMap<String, HashSet<String>>,
    file_unknown_deps: HashMap<String, HashSet<String>>,
    crawl_mtime: HashMap<String, SystemTime>,
}

impl ResolverCaches {
    pub fn clear(&mut self) {
        self.known_paths.clear();
        self.file_known_deps.clear();
        self.file_unknown_deps.clear();
        self.crawl_mtime.clear();
    }
}

#[derive(Debug, Default)]
pub struct Resolver {
    caches: ResolverCaches,
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver::default()
    }

    /// Drops all cached resolutions. Call after [`SearchPaths`] changes.
    pub fn clear_caches(&mut self) {
        self.caches.clear();
    }

    /// Crawls the transitive `#include` closure of `src_path`.
    pub fn resolve(
        &mut self,
        src_path: &str,
        index: &ProjectIndex,
        search_paths: &SearchPaths,
        config: &Config,
    ) -> (Vec<String>, FailedFiles) {
        let src_path = normalize(src_path);
        let include_re = build_include_regex(config.builtin_libs);

        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(src_path.clone());
        let mut found_basenames: HashSet<String> = HashSet::new();
        found_basenames.insert(basename(&src_path));
        let mut first_pop = true;

        let mut failed_files: FailedFiles = HashMap::new();
        let mut pending_search: HashMap<String, HashSet<String>> = HashMap::new();
        let mut output: Vec<String> = Vec::new();

        while !queue.is_empty() || !pending_search.is_empty() {
            let Some(f) = queue.pop_front() else {
                self.process_pending_search(&mut pending_search, search_paths, &mut queue, &mut found_basenames, &mut failed_files);
                continue;
            };

            if !pathutil::is_file(&f) {
                failed_files.entry(f).or_default();
                continue;
            }

            let f_basename = basename(&f);
            let dependents = match self.lookup_known_deps(&f, &f_basename, &mut failed_files, search_paths) {
                Some(deps) => deps,
                None => match self.crawl(&f, &f_basename, &include_re, index, &mut pending_search) {
                    Some(deps) => deps,
                    None => {
                        failed_files.entry(f.clone()).or_default();
                        continue;
                    }
                },
            };

            for dep in &dependents {
                let b = basename(dep);
                if found_basenames.insert(b) {
                    queue.push_back(dep.clone());
                }
            }

            let mut include_this = true;
            if first_pop {
                first_pop = false;
                include_this = config.include_source;
            }
            if include_this {
                output.push(f.clone());
            }
        }

        (output, failed_files)
    }

    /// Mirrors `findInFileKnownDeps`: returns `Some` if the cache is
    /// usable as-is or after re-resolving stale entries, `None` if the
    /// file needs a full re-crawl.
    fn lookup_known_deps(
        &mut self,
        f: &str,
        f_basename: &str,
        failed_files: &mut FailedFiles,
        search_paths: &SearchPaths,
    ) -> Option<HashSet<String>> {
        let cached = self.caches.file_known_deps.get(f_basename).cloned();
        let has_crawl_record = self.caches.crawl_mtime.contains_key(f_basename);
        if cached.is_none() && !has_crawl_record {
            return None;
        }
        let found = cached.unwrap_or_default();

        let current_mtime = pathutil::mtime(f)?;
        let crawl_mtime = *self.caches.crawl_mtime.get(f_basename)?;
        if current_mtime > crawl_mtime {
            self.caches.file_known_deps.remove(f_basename);
            self.caches.file_unknown_deps.remove(f_basename);
            self.caches.crawl_mtime.remove(f_basename);
            return None;
        }

        let mut valid: HashSet<String> = HashSet::new();
        let mut missing_basenames: HashSet<String> = HashSet::new();
        for p in &found {
            if pathutil::is_file(p) {
                valid.insert(p.clone());
            } else {
                missing_basenames.insert(basename(p));
            }
        }

        if missing_basenames.is_empty() {
            if let Some(unk) = self.caches.file_unknown_deps.get(f_basename) {
                if !unk.is_empty() {
                    failed_files.entry(f.to_string()).or_default().extend(unk.iter().cloned());
                }
            }
            return Some(valid);
        }

        let mut still_missing = missing_basenames.clone();
        for name in &missing_basenames {
            if let Some(p) = self.lookup_known_path(name) {
                valid.insert(p);
                still_missing.remove(name);
            }
        }

        if !still_missing.is_empty() {
            let resolved = self.search_for(&still_missing, search_paths);
            for (name, path) in &resolved {
                valid.insert(path.clone());
                still_missing.remove(name);
            }
        }

        self.caches.file_known_deps.insert(f_basename.to_string(), valid.clone());
        if still_missing.is_empty() {
            self.caches.file_unknown_deps.remove(f_basename);
        } else {
            failed_files.entry(f.to_string()).or_default().extend(still_missing.iter().cloned());
            self.caches.file_unknown_deps.insert(f_basename.to_string(), still_missing);
        }

        Some(valid)
    }

    /// Full crawl of a file's `#include` directives. Returns `None` if
    /// the file could not be read.
    fn crawl(
        &mut self,
        f: &str,
        f_basename: &str,
        include_re: &Regex,
        index: &ProjectIndex,
        pending_search: &mut HashMap<String, HashSet<String>>,
    ) -> Option<HashSet<String>> {
        let content = pathutil::read_text(f)?;
        let dir = dirname(f);
        let mut dependents: HashSet<String> = HashSet::new();
        let mut unknown_basenames: HashSet<String> = HashSet::new();

        for cap in include_re.captures_iter(&content) {
            let token = normalize(&cap[1]);
            let token_basename = basename(&token);

            let mut resolved = self.lookup_known_path(&token_basename);

            if resolved.is_none() {
                if token.contains('\\') {
                    let candidate = if looks_absolute(&token) {
                        token.clone()
                    } else {
                        normalize(&format!("{dir}\\{token}"))
                    };
                    if pathutil::is_file(&candidate) {
                        resolved = Some(candidate);
                    } else {
                        unknown_basenames.insert(basename(&candidate));
                    }
                } else {
                    let same_dir = normalize(&format!("{dir}\\{token}"));
                    if pathutil::is_file(&same_dir) {
                        resolved = Some(same_dir);
                    } else if let Some(p) = index.source.get(&token).or_else(|| index.relevant.get(&token)) {
                        resolved = Some(p.clone());
                    } else {
                        unknown_basenames.insert(token.clone());
                    }
                }
            }

            if let Some(path) = resolved {
                let path = normalize(&path);
                if path == f {
                    continue;
                }
                if dependents.insert(path.clone()) {
                    self.caches.known_paths.entry(basename(&path)).or_insert(path);
                }
            }
        }

        let crawl_time = pathutil::mtime(f).unwrap_or(SystemTime::UNIX_EPOCH);
        self.caches.crawl_mtime.insert(f_basename.to_string(), crawl_time);
        self.caches.file_known_deps.insert(f_basename.to_string(), dependents.clone());

        if !unknown_basenames.is_empty() {
            pending_search.entry(f.to_string()).or_default().extend(unknown_basenames);
        }

        Some(dependents)
    }

    fn lookup_known_path(&mut self, name: &str) -> Option<String> {
        match self.caches.known_paths.get(name) {
            Some(p) if pathutil::is_file(p) => Some(p.clone()),
            Some(_) => {
                self.caches.known_paths.remove(name);
                None
            }
            None => None,
        }
    }

    fn search_for(&mut self, names: &HashSet<String>, search_paths: &SearchPaths) -> HashMap<String, String> {
        let mut remaining = names.clone();
        let mut found = HashMap::new();
        for sp in &search_paths.0 {
            if remaining.is_empty() {
                break;
            }
            let patterns: Vec<String> = remaining.iter().cloned().collect();
            let hits = pathutil::find_files(&patterns, sp);
            for (name, path) in hits {
                if remaining.remove(&name) {
                    self.caches.known_paths.entry(name.clone()).or_insert_with(|| path.clone());
                    found.insert(name, path);
                }
            }
        }
        found
    }

    /// Drains `pending_search`, looking up every outstanding basename
    /// across `search_paths` in one pass, attributing hits back to their
    /// requesting files and the rest to `failed_files`.
    fn process_pending_search(
        &mut self,
        pending_search: &mut HashMap<String, HashSet<String>>,
        search_paths: &SearchPaths,
        queue: &mut VecDeque<String>,
        found_basenames: &mut HashSet<String>,
        failed_files: &mut FailedFiles,
    ) {
        if pending_search.is_empty() {
            return;
        }

        let mut unknowns: HashSet<String> = HashSet::new();
        for names in pending_search.values() {
            unknowns.extend(names.iter().cloned());
        }

        let resolved = self.search_for(&unknowns, search_paths);

        for path in resolved.values() {
            if found_basenames.insert(basename(path)) {
                queue.push_back(path.clone());
            }
        }

        for (file_path, names) in pending_search.iter_mut() {
            let found_here: Vec<String> = names.iter().filter(|n| resolved.contains_key(*n)).cloned().collect();
            if found_here.is_empty() {
                continue;
            }
            let mut known_deps = HashSet::new();
            for n in &found_here {
                known_deps.insert(resolved[n].clone());
                names.remove(n);
            }
            self.caches.file_known_deps.entry(basename(file_path)).or_default().extend(known_deps);
        }

        pending_search.retain(|_, names| !names.is_empty());

        for (file_path, names) in pending_search.iter() {
            failed_files.entry(file_path.clone()).or_default().extend(names.iter().cloned());
            self.caches.file_unknown_deps.insert(basename(file_path), names.clone());
        }

        pending_search.clear();
    }
}

fn build_include_regex(builtin_libs: bool) -> Regex {
    let pattern = if builtin_libs {
        r#"#include\s+[<"]([^<>"]+)[>"]"#
    } else {
        r#"#include\s+"([^<>"]+)""#
    };
    RegexBuilder::new(pattern).case_insensitive(true).build().expect("static include pattern is valid")
}

fn looks_absolute(p: &str) -> bool {
    let b = p.as_bytes();
    b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && b[2] == b'\\'
}
