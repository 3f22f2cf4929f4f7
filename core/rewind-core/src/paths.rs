//! Monitored application paths and path normalization.
//!
//! The config stores the list as one semicolon-delimited string. Parsing
//! discards empty entries and collapses duplicates. Matching happens on
//! lexically normalized paths:
//! - repeated separators collapse
//! - `.` segments drop, `..` segments pop the previous segment
//! - trailing separators are stripped
//!
//! No filesystem access happens here; a monitored executable does not need to
//! exist for its path to be configured.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

pub const PATH_SEPARATOR: char = ';';

/// Ordered, duplicate-free list of monitored executable paths.
///
/// Order only matters for display and for writing the list back to the
/// config file. Presence matching treats it as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitoredPaths {
    entries: Vec<String>,
}

impl MonitoredPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `;`-delimited list. The first occurrence of a duplicate keeps
    /// its position.
    pub fn parse(raw: &str) -> Self {
        let mut paths = Self::new();
        for entry in raw.split(PATH_SEPARATOR) {
            let entry = entry.trim();
            if entry.is_empty() || paths.contains(entry) {
                continue;
            }
            paths.entries.push(entry.to_string());
        }
        paths
    }

    /// Adds `path` as the most recent entry. An existing equal entry moves to
    /// the end instead of being duplicated. Returns false for blank input.
    pub fn add(&mut self, path: &str) -> bool {
        let path = path.trim();
        if path.is_empty() {
            return false;
        }
        self.entries.retain(|entry| entry != path);
        self.entries.push(path.to_string());
        true
    }

    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry != path.trim());
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry == path)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized form of every entry, for membership checks.
    pub fn normalized(&self) -> HashSet<PathBuf> {
        self.entries
            .iter()
            .map(|entry| normalize_path(Path::new(entry)))
            .collect()
    }

    pub fn to_config_string(&self) -> String {
        self.entries.join(&PATH_SEPARATOR.to_string())
    }
}

impl<S: AsRef<str>> FromIterator<S> for MonitoredPaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut paths = Self::new();
        for entry in iter {
            let entry = entry.as_ref().trim();
            if !entry.is_empty() && !paths.contains(entry) {
                paths.entries.push(entry.to_string());
            }
        }
        paths
    }
}

/// Lexical path normalization. Does not touch the filesystem or resolve
/// symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // `..` above the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Joins a relative `path` onto `base` and normalizes the result.
pub fn absolutize(path: &Path, base: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return normalize_path(path);
    }
    match base {
        Some(base) => normalize_path(&base.join(path)),
        None => normalize_path(path),
    }
}
