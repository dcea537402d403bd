//! Application configuration.
//!
//! Configuration is read from TOML files, later ones overriding earlier
//! ones key by key:
//! 1. `/etc/detach/config.toml`
//! 2. `~/.config/detach/config.toml` (Linux) or the platform equivalent
//! 3. `$DETACH_CONFIG` (environment variable)
//! 4. `--config <FILE>` (must exist)
//!
//! Command-line overrides are applied on top, then the result is checked
//! and turned into [`Settings`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use toml::Table;

use crate::error::{DetachError, Result};
use crate::export::destination::DestinationPattern;

/// Top-level configuration, as written in the files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What to look at and where to put it.
    pub detach: DetachConfig,
    /// Outbound relay.
    pub smtp: SmtpConfig,
    /// External learn commands.
    pub spam: SpamConfig,
    /// Logging.
    pub general: GeneralConfig,
}

/// `[detach]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetachConfig {
    /// Operator address, used as sender when rejecting.
    pub user: Option<String>,
    /// Maildir folder holding the list notices.
    pub maildir: Option<PathBuf>,
    /// Skip messages already marked as seen.
    pub exclude_seen: bool,
    /// Prefix of attachment directories.
    pub dir: Option<String>,
    /// Prefix of the URL the attachment directories are served under.
    pub url: Option<String>,
    /// strftime pattern for the directory name, `{}` marks the suffix.
    pub pattern: Option<String>,
    /// Where forwarded messages go.
    pub recipient: Option<String>,
    /// List request address that receives rejections.
    pub request_address: Option<String>,
}

/// `[smtp]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Skip certificate verification after STARTTLS.
    pub accept_invalid_certs: bool,
    pub timeout_secs: u64,
}

/// `[spam]` section; commands are argv arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamConfig {
    pub learn_spam: Option<Vec<String>>,
    pub learn_ham: Option<Vec<String>>,
}

/// `[general]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory of `detach.log`.
    pub log_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for DetachConfig {
    fn default() -> Self {
        Self {
            user: None,
            maildir: None,
            exclude_seen: true,
            dir: None,
            url: None,
            pattern: None,
            recipient: None,
            request_address: None,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            accept_invalid_certs: false,
            timeout_secs: 30,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

// ── Command-line overrides ──────────────────────────────────────

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Extra configuration file, read last.
    pub config: Option<PathBuf>,
    /// Maildir to use instead of the configured one.
    pub maildir: Option<PathBuf>,
    /// Look at seen messages too.
    pub with_read: bool,
}

impl Config {
    /// Apply command-line overrides.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(maildir) = &overrides.maildir {
            self.detach.maildir = Some(maildir.clone());
        }
        if overrides.with_read {
            self.detach.exclude_seen = false;
        }
    }

    /// Check required keys and build the run settings.
    pub fn settings(&self) -> Result<Settings> {
        let d = &self.detach;
        let user = required(&d.user, "detach", "user")?;
        let maildir = d
            .maildir
            .as_deref()
            .map(expand_tilde)
            .ok_or_else(|| missing("detach", "maildir"))?;
        let dir = required(&d.dir, "detach", "dir")?;
        let pattern = required(&d.pattern, "detach", "pattern")?;
        let destination = DestinationPattern::new(&dir, d.url.as_deref(), &pattern)
            .map_err(|e| DetachError::Config(e.to_string()))?;

        Ok(Settings {
            user,
            maildir,
            exclude_seen: d.exclude_seen,
            destination,
            recipient: required(&d.recipient, "detach", "recipient")?,
            request_address: required(&d.request_address, "detach", "request_address")?,
            smtp: SmtpSettings {
                host: self.smtp.host.clone(),
                port: self.smtp.port,
                accept_invalid_certs: self.smtp.accept_invalid_certs,
                timeout: Duration::from_secs(self.smtp.timeout_secs),
            },
            learn_spam: command(&self.spam.learn_spam),
            learn_ham: command(&self.spam.learn_ham),
        })
    }
}

fn missing(section: &str, key: &str) -> DetachError {
    DetachError::Config(format!("No option '{key}' in section: '{section}'"))
}

fn required(value: &Option<String>, section: &str, key: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| missing(section, key))
}

fn command(argv: &Option<Vec<String>>) -> Option<Vec<String>> {
    argv.clone().filter(|argv| !argv.is_empty())
}

/// Replace a leading `~/` with the home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// ── Validated settings ──────────────────────────────────────────

/// Everything a run needs, checked.
#[derive(Debug, Clone)]
pub struct Settings {
    pub user: String,
    pub maildir: PathBuf,
    pub exclude_seen: bool,
    pub destination: DestinationPattern,
    pub recipient: String,
    pub request_address: String,
    pub smtp: SmtpSettings,
    pub learn_spam: Option<Vec<String>>,
    pub learn_ham: Option<Vec<String>>,
}

/// Relay connection parameters.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

// ── Load ────────────────────────────────────────────────────────

/// A configuration file to read; `required` ones must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub path: PathBuf,
    pub required: bool,
}

/// Configuration files in the order they are read.
pub fn config_layers(explicit: Option<&Path>) -> Vec<Layer> {
    let mut layers = vec![Layer {
        path: PathBuf::from("/etc/detach/config.toml"),
        required: false,
    }];
    if let Some(dir) = dirs::config_dir() {
        layers.push(Layer {
            path: dir.join("detach").join("config.toml"),
            required: false,
        });
    }
    if let Ok(env_path) = std::env::var("DETACH_CONFIG") {
        layers.push(Layer {
            path: PathBuf::from(env_path),
            required: false,
        });
    }
    if let Some(path) = explicit {
        layers.push(Layer {
            path: path.to_path_buf(),
            required: true,
        });
    }
    layers
}

/// Load configuration from the standard locations plus overrides.
pub fn load_config(overrides: &Overrides) -> Result<Config> {
    let mut config = load_layers(&config_layers(overrides.config.as_deref()))?;
    config.apply(overrides);
    Ok(config)
}

/// Read and merge the given layers.
pub fn load_layers(layers: &[Layer]) -> Result<Config> {
    let mut merged = Table::new();

    for layer in layers {
        if !layer.path.exists() {
            if layer.required {
                return Err(DetachError::Config(format!(
                    "config file '{}' does not exist",
                    layer.path.display()
                )));
            }
            continue;
        }
        let contents = std::fs::read_to_string(&layer.path)
            .map_err(|e| DetachError::io(&layer.path, e))?;
        let table: Table = contents.parse().map_err(|e: toml::de::Error| {
            DetachError::Config(format!("{}: {}", layer.path.display(), e.message()))
        })?;
        tracing::info!(path = %layer.path.display(), "Loaded config");
        merge(&mut merged, table);
    }

    toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| DetachError::Config(e.message().to_string()))
}

/// Merge `top` into `base`; tables are merged recursively, anything else
/// is replaced.
fn merge(base: &mut Table, top: Table) {
    for (key, value) in top {
        let top_table = match value {
            toml::Value::Table(table) => table,
            other => {
                base.insert(key, other);
                continue;
            }
        };
        if let Some(toml::Value::Table(base_table)) = base.get_mut(&key) {
            merge(base_table, top_table);
            continue;
        }
        base.insert(key, toml::Value::Table(top_table));
    }
}

/// Return the directory `detach.log` is written to.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("detach")
}
