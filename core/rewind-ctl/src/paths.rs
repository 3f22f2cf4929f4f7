//! Edits the monitored application list in the config file.
//!
//! Every edit is load, change, atomic save. The caller decides whether to
//! nudge a running daemon afterwards.

use rewind_core::config::{load_config, save_config};
use rewind_core::paths::absolutize;
use rewind_core::MonitoredPaths;
use std::path::Path;

pub fn list(config_path: &Path) -> rewind_core::Result<MonitoredPaths> {
    Ok(load_config(config_path)?.monitor.paths())
}

/// Adds `raw` to the list. Relative paths are resolved against `cwd` so the
/// stored entry matches what process enumeration reports. Returns the
/// stored form, or `None` for blank input.
pub fn add(config_path: &Path, raw: &str, cwd: Option<&Path>) -> rewind_core::Result<Option<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let entry = absolutize(Path::new(raw), cwd).to_string_lossy().into_owned();

    let mut config = load_config(config_path)?;
    let mut paths = config.monitor.paths();
    paths.add(&entry);
    config.monitor.set_paths(&paths);
    save_config(config_path, &config)?;
    tracing::info!(path = %entry, total = paths.len(), "Monitored path added");
    Ok(Some(entry))
}

/// Removes an entry exactly as listed. Returns false if it was not present.
pub fn remove(config_path: &Path, entry: &str) -> rewind_core::Result<bool> {
    let mut config = load_config(config_path)?;
    let mut paths = config.monitor.paths();
    if !paths.remove(entry) {
        return Ok(false);
    }
    config.monitor.set_paths(&paths);
    save_config(config_path, &config)?;
    tracing::info!(path = %entry.trim(), total = paths.len(), "Monitored path removed");
    Ok(true)
}

/// Empties the list. Returns how many entries were dropped.
pub fn clear(config_path: &Path) -> rewind_core::Result<usize> {
    let mut config = load_config(config_path)?;
    let mut paths = config.monitor.paths();
    let dropped = paths.len();
    paths.clear();
    config.monitor.set_paths(&paths);
    save_config(config_path, &config)?;
    tracing::info!(dropped, "Monitored paths cleared");
    Ok(dropped)
}
