//! Configuration loader
//!
//! Loads scheduler configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file from the working directory, if present
//! 2. Applies any `CADENCE_*` environment variables on top of the defaults
//! 3. If none are set, falls back to loading from file
//! 4. Probes multiple paths for config files (JSON or TOML)
//!
//! ## Environment Variables
//! - `CADENCE_SHORT_POLL_INTERVAL`: Poll interval (seconds) without notifications
//! - `CADENCE_LONG_POLL_INTERVAL`: Poll interval (seconds) with notifications
//! - `CADENCE_SESSIONS_COMMIT_DELAY`: Commit delay in seconds
//! - `CADENCE_NOTIFICATIONS_ENABLED`: Whether notifications start enabled
//! - `CADENCE_STOP_TIMEOUT`: Worker join timeout in seconds
//! - `CADENCE_INITIAL_BACKOFF`: First backoff after ordinary failures
//! - `CADENCE_SHORT_INITIAL_BACKOFF`: First backoff after network failures
//! - `CADENCE_MAX_BACKOFF`: Backoff ceiling in seconds
//! - `CADENCE_BACKOFF_MULTIPLIER`: Growth factor between backoffs
//! - `CADENCE_BACKOFF_JITTER`: Upward jitter fraction in `[0, 1]`
//! - `CADENCE_MAX_THROTTLE`: Ceiling for server throttles in seconds
//! - `CADENCE_LOG_FILTER`: `EnvFilter` directive
//! - `CADENCE_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./cadence.json` or `./cadence.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cadence_domain::constants::ENV_PREFIX;
use cadence_domain::{CadenceError, Config, Result};

/// Load configuration with automatic fallback strategy
///
/// First applies environment variables. If no `CADENCE_*` variable is set,
/// falls back to loading from a config file. The result is validated.
///
/// # Errors
/// Returns `CadenceError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value fails validation
pub fn load() -> Result<Config> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::trace!(error = %e, "No .env file loaded");
    }

    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        },
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)?
        },
    };

    config.validate()?;
    Ok(config)
}

/// Like [`load`], but falls back to defaults when nothing usable is found.
pub fn load_or_default() -> Config {
    load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Using default configuration");
        Config::default()
    })
}

/// Load configuration from environment variables
///
/// Every variable is optional; unset ones keep their default. At least one
/// must be present so that an empty environment can fall through to a file.
///
/// # Errors
/// Returns `CadenceError::Config` if no variable is set or a value does not
/// parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    let mut found = false;

    let scheduler = &mut config.scheduler;
    found |= env_parse("SHORT_POLL_INTERVAL", &mut scheduler.short_poll_interval_secs)?;
    found |= env_parse("LONG_POLL_INTERVAL", &mut scheduler.long_poll_interval_secs)?;
    found |= env_parse("SESSIONS_COMMIT_DELAY", &mut scheduler.sessions_commit_delay_secs)?;
    found |= env_bool("NOTIFICATIONS_ENABLED", &mut scheduler.notifications_enabled);
    found |= env_parse("STOP_TIMEOUT", &mut scheduler.stop_timeout_secs)?;

    let backoff = &mut config.backoff;
    found |= env_parse("INITIAL_BACKOFF", &mut backoff.initial_backoff_secs)?;
    found |= env_parse("SHORT_INITIAL_BACKOFF", &mut backoff.short_initial_backoff_secs)?;
    found |= env_parse("MAX_BACKOFF", &mut backoff.max_backoff_secs)?;
    found |= env_parse("BACKOFF_MULTIPLIER", &mut backoff.multiplier)?;
    found |= env_parse("BACKOFF_JITTER", &mut backoff.jitter)?;
    found |= env_parse("MAX_THROTTLE", &mut backoff.max_throttle_secs)?;

    if let Some(filter) = env_string("LOG_FILTER") {
        config.logging.filter = filter;
        found = true;
    }
    found |= env_bool("LOG_JSON", &mut config.logging.json);

    if !found {
        return Err(CadenceError::Config(format!("No {ENV_PREFIX}* environment variables set")));
    }
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CadenceError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CadenceError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        },
        None => probe_config_paths().ok_or_else(|| {
            CadenceError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CadenceError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CadenceError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CadenceError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CadenceError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Search multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 6] = [
        "config.json",
        "config.toml",
        "cadence.json",
        "cadence.toml",
        "../config.json",
        "../config.toml",
    ];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}")).ok()
}

/// Overwrites `target` when the variable is set; returns whether it was.
fn env_parse<T>(key: &str, target: &mut T) -> Result<bool>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = env_string(key) else {
        return Ok(false);
    };
    *target = raw.trim().parse().map_err(|e| {
        CadenceError::Config(format!("Invalid value for {ENV_PREFIX}{key} ('{raw}'): {e}"))
    })?;
    Ok(true)
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, target: &mut bool) -> bool {
    let Some(raw) = env_string(key) else {
        return false;
    };
    *target = matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
    true
}
