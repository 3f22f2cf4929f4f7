//! Process presence detection.
//!
//! Answers one question per tick: is any process running whose executable is
//! one of the monitored paths? A process that cannot be inspected (permission
//! denied, exited mid-scan) is skipped instead of failing the whole query.

use crate::paths::{absolutize, normalize_path, MonitoredPaths};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use sysinfo::{ProcessRefreshKind, System, UpdateKind};

/// What enumeration could learn about one live process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub exe: Option<PathBuf>,
    /// First command-line argument, as the process was invoked.
    pub argv0: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl ProcessEntry {
    /// Normalized paths this process may be identified by.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(exe) = self.exe.as_deref() {
            candidates.push(normalize_path(exe));
        }
        if let Some(argv0) = self.argv0.as_deref().filter(|value| !value.is_empty()) {
            let resolved = absolutize(Path::new(argv0), self.cwd.as_deref());
            if !candidates.contains(&resolved) {
                candidates.push(resolved);
            }
        }
        candidates
    }
}

/// Enumerates running processes. Each item is either an inspectable process
/// or the reason it could not be inspected.
pub trait ProcessSource: Send + Sync {
    fn processes(&self) -> Vec<Result<ProcessEntry, String>>;
}

#[derive(Debug, Clone, Default)]
pub struct SysinfoProcessSource;

impl ProcessSource for SysinfoProcessSource {
    fn processes(&self) -> Vec<Result<ProcessEntry, String>> {
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessRefreshKind::new()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .with_cwd(UpdateKind::OnlyIfNotSet),
        );

        sys.processes()
            .iter()
            .map(|(pid, process)| {
                let exe = process.exe().map(Path::to_path_buf);
                let argv0 = process.cmd().first().cloned();
                if exe.is_none() && argv0.is_none() {
                    return Err(format!("process {} has no accessible executable path", pid));
                }
                Ok(ProcessEntry {
                    pid: pid.as_u32(),
                    exe,
                    argv0,
                    cwd: process.cwd().map(Path::to_path_buf),
                })
            })
            .collect()
    }
}

pub struct PresenceOracle {
    source: Box<dyn ProcessSource>,
}

impl PresenceOracle {
    pub fn new(source: impl ProcessSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub fn system() -> Self {
        Self::new(SysinfoProcessSource)
    }

    /// True iff any live process runs one of `paths`. Always false for an
    /// empty set.
    pub fn is_any_running(&self, paths: &MonitoredPaths) -> bool {
        if paths.is_empty() {
            return false;
        }
        let wanted = paths.normalized();
        self.source
            .processes()
            .into_iter()
            .filter_map(inspectable)
            .any(|entry| matches_any(&entry, &wanted))
    }

    /// Every running process matching `paths`, for diagnostics.
    pub fn running_matches(&self, paths: &MonitoredPaths) -> Vec<(u32, PathBuf)> {
        if paths.is_empty() {
            return Vec::new();
        }
        let wanted = paths.normalized();
        let mut matches: Vec<(u32, PathBuf)> = self
            .source
            .processes()
            .into_iter()
            .filter_map(inspectable)
            .filter_map(|entry| {
                entry
                    .candidate_paths()
                    .into_iter()
                    .find(|candidate| wanted.contains(candidate))
                    .map(|path| (entry.pid, path))
            })
            .collect();
        matches.sort();
        matches
    }
}

fn inspectable(entry: Result<ProcessEntry, String>) -> Option<ProcessEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(reason) => {
            tracing::trace!(reason = %reason, "Skipping uninspectable process");
            None
        }
    }
}

fn matches_any(entry: &ProcessEntry, wanted: &HashSet<PathBuf>) -> bool {
    entry
        .candidate_paths()
        .iter()
        .any(|candidate| wanted.contains(candidate))
}
