//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILFS_CONFIG` (environment variable)
//! 2. `~/.config/mailfs/config.toml` (Linux)
//!    `~/Library/Application Support/mailfs/config.toml` (macOS)
//! 3. Built-in defaults
//!
//! Command-line flags (and their environment fallbacks) are layered on top
//! with [`Config::apply`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MailFsError, Result};

/// File name of the log written under [`cache_dir`].
pub const LOG_FILE_NAME: &str = "mailfs.log";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mailbox connection settings.
    pub imap: ImapConfig,
    /// Mount and refresh settings.
    pub mount: MountConfig,
    /// General behavior settings.
    pub general: GeneralConfig,
}

/// Mailbox connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    /// Server host name; also used for TLS verification.
    pub host: String,
    /// Server port (IMAPS).
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Mailbox to project.
    pub mailbox: String,
    /// Fetch only the first N messages.
    pub message_limit: Option<u32>,
}

/// Mount and refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Directory to mount the filesystem on.
    pub mountpoint: PathBuf,
    /// Seconds between two refreshes.
    pub refresh_interval_secs: u64,
    /// Seconds the kernel may cache attributes and entries.
    pub attr_ttl_secs: u64,
    /// Let other users access the mount (needs `user_allow_other`).
    pub allow_other: bool,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 993,
            user: String::new(),
            password: String::new(),
            mailbox: "INBOX".to_string(),
            message_limit: None,
        }
    }
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            mountpoint: PathBuf::from("/mnt"),
            refresh_interval_secs: 120,
            attr_ttl_secs: 1,
            allow_other: false,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl MountConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.attr_ttl_secs)
    }
}

/// Values given on the command line (or through their environment
/// fallbacks). `None` leaves the file value in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub message_limit: Option<u32>,
    pub refresh_interval_secs: Option<u64>,
    pub mountpoint: Option<PathBuf>,
}

impl Config {
    /// Layer command-line values over the loaded file.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.imap.host = host;
        }
        if let Some(user) = overrides.user {
            self.imap.user = user;
        }
        if let Some(password) = overrides.password {
            self.imap.password = password;
        }
        if overrides.message_limit.is_some() {
            self.imap.message_limit = overrides.message_limit;
        }
        if let Some(secs) = overrides.refresh_interval_secs {
            self.mount.refresh_interval_secs = secs;
        }
        if let Some(mountpoint) = overrides.mountpoint {
            self.mount.mountpoint = mountpoint;
        }
    }

    /// Check that everything needed to reach the mailbox is present.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("host", self.imap.host.is_empty()),
            ("user", self.imap.user.is_empty()),
            ("password", self.imap.password.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(MailFsError::Config(format!(
                "missing IMAP {}",
                missing.join(", ")
            )));
        }
        if self.imap.message_limit == Some(0) {
            return Err(MailFsError::Config(
                "message limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Read configuration from `path`, or from the standard location when `None`.
///
/// A missing file yields the defaults. A file that cannot be read or parsed
/// is an error, so the caller can report it once logging is up.
pub fn read_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = config_file_path(path) else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| MailFsError::io(&path, e))?;
    toml::from_str(&contents)
        .map_err(|e| MailFsError::Config(format!("cannot parse {}: {e}", path.display())))
}

/// The config file to read: `explicit` if given, else `$MAILFS_CONFIG`, else
/// the standard config directory.
pub fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(env_path) = std::env::var("MAILFS_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailfs").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailfs")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join(LOG_FILE_NAME)
}
