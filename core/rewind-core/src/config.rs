//! Configuration loading, saving and hot-reload.
//!
//! The config lives in `~/.rewind/config.toml` unless `REWIND_CONFIG` points
//! elsewhere. A missing file yields defaults. Every section is optional.

use crate::error::{Result, RewindError};
use crate::paths::MonitoredPaths;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub const CONFIG_ENV: &str = "REWIND_CONFIG";
pub const CONFIG_DIR: &str = ".rewind";
pub const CONFIG_FILE: &str = "config.toml";
pub const SOCKET_ENV: &str = "REWIND_DAEMON_SOCKET";
pub const SOCKET_FILE: &str = "daemon.sock";

pub const MIN_INTERVAL_SECS: u64 = 1;
pub const MAX_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_INTERVAL_SECS: u64 = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewindConfig {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub automation_enabled: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            automation_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Semicolon-delimited executable paths.
    #[serde(default)]
    pub application_paths: String,
}

impl MonitorConfig {
    pub fn paths(&self) -> MonitoredPaths {
        MonitoredPaths::parse(&self.application_paths)
    }

    pub fn set_paths(&mut self, paths: &MonitoredPaths) {
        self.application_paths = paths.to_config_string();
    }
}

/// Argv commands driving the external replay buffer control tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Exit status 0 means the buffer is active.
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub start: Vec<String>,
    #[serde(default)]
    pub stop: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackConfig {
    #[serde(default = "default_true")]
    pub voice_start: bool,
    #[serde(default = "default_true")]
    pub voice_stop: bool,
    #[serde(default = "default_true")]
    pub voice_save: bool,
    /// Player argv; the sound file is appended as the last argument.
    #[serde(default)]
    pub player: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_sound: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sound: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_sound: Option<PathBuf>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            voice_start: true,
            voice_stop: true,
            voice_save: true,
            player: Vec::new(),
            start_sound: None,
            stop_sound: None,
            saved_sound: None,
        }
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

/// Snapshot read by the scheduler at the top of each loop body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub automation_enabled: bool,
    pub paths: MonitoredPaths,
}

impl RewindConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval_secs: clamp_interval(self.poll.interval_secs),
            automation_enabled: self.poll.automation_enabled,
            paths: self.monitor.paths(),
        }
    }
}

/// Clamps the check interval into `1..=30` seconds.
pub fn clamp_interval(interval_secs: u64) -> u64 {
    let clamped = interval_secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
    if clamped != interval_secs {
        tracing::warn!(
            requested = interval_secs,
            applied = clamped,
            "Check interval out of range; clamping"
        );
    }
    clamped
}

pub fn rewind_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(RewindError::HomeDirNotFound)?;
    Ok(home.join(CONFIG_DIR))
}

pub fn default_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(rewind_dir()?.join(CONFIG_FILE))
}

/// Socket shared by `rewind-daemon` and its clients.
pub fn daemon_socket_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(rewind_dir()?.join(SOCKET_FILE))
}

/// Loads the config, returning defaults if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<RewindConfig> {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RewindConfig::default())
        }
        Err(err) => {
            return Err(RewindError::ConfigReadFailed {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };

    toml::from_str(&content).map_err(|err| RewindError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Writes the config through a temp file and rename so readers never see a
/// half-written file.
pub fn save_config(path: &Path, config: &RewindConfig) -> Result<()> {
    let write_failed = |source| RewindError::ConfigWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent).map_err(write_failed)?;
        }
    }

    let payload = toml::to_string_pretty(config)
        .map_err(|err| RewindError::ConfigSerialize(err.to_string()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs_err::write(&tmp_path, payload).map_err(write_failed)?;
    fs_err::rename(&tmp_path, path).map_err(write_failed)?;
    Ok(())
}

/// Source of fresh settings for every scheduler pass.
pub trait ConfigSource: Send + Sync {
    fn poll_settings(&self) -> PollSettings;

    fn automation_enabled(&self) -> bool {
        self.poll_settings().automation_enabled
    }
}

/// Live config shared between the daemon's request handlers and the scheduler.
#[derive(Debug)]
pub struct SharedConfig {
    path: Option<PathBuf>,
    inner: RwLock<RewindConfig>,
}

impl SharedConfig {
    /// Loads from `path`, or from the default location when `None`.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let config = load_config(&path)?;
        Ok(Self {
            path: Some(path),
            inner: RwLock::new(config),
        })
    }

    /// Like [`SharedConfig::load`], but an unreadable or malformed file
    /// leaves defaults live. The path is kept so a later reload can recover.
    pub fn load_or_default(path: PathBuf) -> Self {
        let config = match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load config; using defaults");
                RewindConfig::default()
            }
        };
        Self {
            path: Some(path),
            inner: RwLock::new(config),
        }
    }

    /// In-memory config with no backing file; `reload` is a no-op.
    pub fn in_memory(config: RewindConfig) -> Self {
        Self {
            path: None,
            inner: RwLock::new(config),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current(&self) -> RewindConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: RewindConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Re-reads the backing file. On error the previous config stays live.
    pub fn reload(&self) -> Result<RewindConfig> {
        let Some(path) = self.path.as_deref() else {
            return Ok(self.current());
        };
        let config = load_config(path)?;
        self.replace(config.clone());
        Ok(config)
    }
}

impl ConfigSource for SharedConfig {
    fn poll_settings(&self) -> PollSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .poll_settings()
    }

    fn automation_enabled(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .poll
            .automation_enabled
    }
}
