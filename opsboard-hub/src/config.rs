//! Configuration for the opsboard hub.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/opsboard-hub/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

use opsboard::schedule::{DEFAULT_DEADLINE_WINDOW_HOURS, MAX_DEADLINE_WINDOW_HOURS};

use crate::router::DEFAULT_MAX_ROOMS_PER_CONNECTION;
use crate::server::DEFAULT_MAX_FRAME_SIZE;

/// Errors that can occur when loading hub configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for {key}: {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HubConfigFile {
    server: ServerFileConfig,
    schedule: ScheduleFileConfig,
    log_level: Option<String>,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_frame_size: Option<usize>,
    max_rooms_per_connection: Option<usize>,
}

/// `[schedule]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ScheduleFileConfig {
    deadline_window_hours: Option<i64>,
    sweep_interval_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the hub.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "opsboard notification hub")]
pub struct HubCliArgs {
    /// Address to bind the hub to.
    #[arg(short, long, env = "OPSBOARD_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/opsboard-hub/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum client frame size in bytes.
    #[arg(long)]
    pub max_frame_size: Option<usize>,

    /// Maximum rooms one connection may subscribe to.
    #[arg(long)]
    pub max_rooms_per_connection: Option<usize>,

    /// Deadline reminder horizon in hours.
    #[arg(long)]
    pub deadline_window_hours: Option<i64>,

    /// Seconds between deadline sweeps.
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "OPSBOARD_LOG")]
    pub log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:7400`).
    pub bind_addr: String,
    /// Largest client frame accepted, in bytes.
    pub max_frame_size: usize,
    pub max_rooms_per_connection: usize,
    /// Reminder horizon for the deadline sweep, in hours.
    pub deadline_window_hours: i64,
    /// Period of the deadline sweep.
    pub sweep_interval: Duration,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7400".to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_rooms_per_connection: DEFAULT_MAX_ROOMS_PER_CONNECTION,
            deadline_window_hours: DEFAULT_DEADLINE_WINDOW_HOURS,
            sweep_interval: Duration::from_secs(24 * 60 * 60),
            log_level: "info".to_string(),
        }
    }
}

impl HubConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or a resolved value is out of range.
    pub fn load(cli: &HubCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &HubCliArgs, file: &HubConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_frame_size: cli
                .max_frame_size
                .or(file.server.max_frame_size)
                .unwrap_or(defaults.max_frame_size),
            max_rooms_per_connection: cli
                .max_rooms_per_connection
                .or(file.server.max_rooms_per_connection)
                .unwrap_or(defaults.max_rooms_per_connection),
            deadline_window_hours: cli
                .deadline_window_hours
                .or(file.schedule.deadline_window_hours)
                .unwrap_or(defaults.deadline_window_hours),
            sweep_interval: cli
                .sweep_interval_secs
                .or(file.schedule.sweep_interval_secs)
                .map_or(defaults.sweep_interval, Duration::from_secs),
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.log_level.clone())
                .unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.deadline_window_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "deadline_window_hours",
                reason: "must be positive".to_string(),
            });
        }
        if self.deadline_window_hours > MAX_DEADLINE_WINDOW_HOURS {
            return Err(ConfigError::Invalid {
                key: "deadline_window_hours",
                reason: format!("must be at most {MAX_DEADLINE_WINDOW_HOURS}"),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "sweep_interval_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid {
                key: "max_frame_size",
                reason: "must allow non-empty frames".to_string(),
            });
        }
        if self.max_rooms_per_connection == 0 {
            return Err(ConfigError::Invalid {
                key: "max_rooms_per_connection",
                reason: "must allow at least one room".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<HubConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(HubConfigFile::default());
        };
        config_dir.join("opsboard-hub").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HubConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
