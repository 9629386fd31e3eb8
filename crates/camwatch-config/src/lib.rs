//! Configuration for the camwatch daemon.
//!
//! TOML camera roster + timing defaults, environment overrides, password
//! resolution (env var or plaintext), and translation to
//! `camwatch_core::WatchConfig`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use camwatch_core::{ActuatorTarget, CameraConfig, EventCodes, Timing, WatchConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for camera '{camera}'")]
    NoCredentials { camera: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Timing and port defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Watched cameras, in startup order.
    #[serde(default)]
    pub cameras: Vec<CameraEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_alarm_delay")]
    pub alarm_delay_secs: u64,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_keepalive_idle")]
    pub keepalive_idle_secs: u64,

    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,

    /// Actuator port used when a camera doesn't set its own.
    #[serde(default = "default_actuator_port")]
    pub actuator_port: u16,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            alarm_delay_secs: default_alarm_delay(),
            reconnect_delay_secs: default_reconnect_delay(),
            tick_interval_ms: default_tick_interval(),
            connect_timeout_secs: default_connect_timeout(),
            keepalive_idle_secs: default_keepalive_idle(),
            keepalive_interval_secs: default_keepalive_interval(),
            notify_timeout_secs: default_notify_timeout(),
            actuator_port: default_actuator_port(),
        }
    }
}

fn default_alarm_delay() -> u64 {
    30
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_tick_interval() -> u64 {
    1000
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_keepalive_idle() -> u64 {
    30
}
fn default_keepalive_interval() -> u64 {
    15
}
fn default_notify_timeout() -> u64 {
    10
}
fn default_actuator_port() -> u16 {
    camwatch_core::DEFAULT_ACTUATOR_PORT
}

/// One `[[cameras]]` entry.
#[derive(Debug, Deserialize, Serialize)]
pub struct CameraEntry {
    /// Log label. Defaults to `"{index}-{host}"`.
    pub name: Option<String>,

    /// Camera IP address or hostname.
    pub host: String,

    #[serde(default = "default_camera_port")]
    pub port: u16,

    pub user: String,

    /// Password (plaintext; prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Comma-separated event codes, e.g. `"VideoMotion,AudioMutation"`.
    pub events: String,

    /// Vera controller IP address or hostname.
    pub actuator_host: String,

    /// Override `defaults.actuator_port`.
    pub actuator_port: Option<u16>,

    /// Vera motion sensor device number.
    pub actuator_device_id: DeviceId,
}

fn default_camera_port() -> u16 {
    80
}

/// Vera device number; written either as `42` or `"42"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DeviceId {
    Number(u64),
    Text(String),
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s.trim()),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the default config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "camwatch", "camwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("camwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// An explicit `path` must exist. The default path may be absent, in which
/// case only built-in defaults and `CAMWATCH_*` variables apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.is_file() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("CAMWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load and validate in one step, resolving passwords from the process
/// environment.
pub fn load_watch_config(path: Option<&Path>) -> Result<WatchConfig, ConfigError> {
    let config = load_config(path)?;
    to_watch_config(&config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a camera password: `password_env` first, then `password`.
pub fn resolve_password(entry: &CameraEntry, camera: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(entry, camera, |name| std::env::var(name).ok())
}

/// Like [`resolve_password`] with a caller-supplied environment lookup.
pub fn resolve_password_with(
    entry: &CameraEntry,
    camera: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(ref env_name) = entry.password_env {
        if let Some(val) = lookup(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Plaintext in config
    if let Some(ref pw) = entry.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        camera: camera.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate and build the runtime `WatchConfig`.
pub fn to_watch_config(config: &Config) -> Result<WatchConfig, ConfigError> {
    to_watch_config_with(config, |name| std::env::var(name).ok())
}

/// Like [`to_watch_config`] with a caller-supplied environment lookup.
pub fn to_watch_config_with(
    config: &Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<WatchConfig, ConfigError> {
    let timing = timing(&config.defaults)?;

    if config.cameras.is_empty() {
        return Err(invalid("cameras", "no cameras configured".into()));
    }

    let cameras = config
        .cameras
        .iter()
        .enumerate()
        .map(|(index, entry)| camera(index, entry, &config.defaults, &lookup))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WatchConfig { cameras, timing })
}

fn timing(defaults: &Defaults) -> Result<Timing, ConfigError> {
    if defaults.tick_interval_ms == 0 {
        return Err(invalid("defaults.tick_interval_ms", "must be greater than zero".into()));
    }

    Ok(Timing {
        alarm_delay: Duration::from_secs(defaults.alarm_delay_secs),
        reconnect_delay: Duration::from_secs(defaults.reconnect_delay_secs),
        tick_interval: Duration::from_millis(defaults.tick_interval_ms),
        connect_timeout: Duration::from_secs(defaults.connect_timeout_secs),
        keepalive_idle: Duration::from_secs(defaults.keepalive_idle_secs),
        keepalive_interval: Duration::from_secs(defaults.keepalive_interval_secs),
        notify_timeout: Duration::from_secs(defaults.notify_timeout_secs),
    })
}

fn camera(
    index: usize,
    entry: &CameraEntry,
    defaults: &Defaults,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<CameraConfig, ConfigError> {
    let host = entry.host.trim();
    if host.is_empty() {
        return Err(invalid(&format!("cameras[{index}].host"), "must not be empty".into()));
    }

    let name = entry
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| format!("{index}-{host}"), str::to_owned);

    if entry.user.trim().is_empty() {
        return Err(ConfigError::NoCredentials { camera: name });
    }

    let events = EventCodes::parse(&entry.events);
    if events.is_empty() {
        return Err(invalid(
            &format!("cameras[{index}].events"),
            "at least one event code is required".into(),
        ));
    }

    let actuator_host = entry.actuator_host.trim();
    if actuator_host.is_empty() {
        return Err(invalid(
            &format!("cameras[{index}].actuator_host"),
            "must not be empty".into(),
        ));
    }

    let device_id = entry.actuator_device_id.to_string();
    if device_id.is_empty() {
        return Err(invalid(
            &format!("cameras[{index}].actuator_device_id"),
            "must not be empty".into(),
        ));
    }

    let password = resolve_password_with(entry, &name, lookup)?;

    Ok(CameraConfig {
        name,
        host: host.to_owned(),
        port: entry.port,
        username: entry.user.clone(),
        password,
        events,
        actuator: ActuatorTarget {
            host: actuator_host.to_owned(),
            port: entry.actuator_port.unwrap_or(defaults.actuator_port),
            device_id,
        },
    })
}

fn invalid(field: &str, reason: String) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason,
    }
}

// ── Tests ───────────────────────────────────────────────────────────
