//! CLI error types with miette diagnostics.
//!
//! Only startup can fail: once the watch loop runs, every camera and
//! actuator error is logged and retried instead of surfacing here.

use miette::Diagnostic;
use thiserror::Error;

use camwatch_config::ConfigError;
use camwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(camwatch::no_config),
        help(
            "Pass --config <path>, set CAMWATCH_CONFIG, or create the file.\n\
             Each camera needs a [[cameras]] table with host, user, events,\n\
             actuator_host and actuator_device_id."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(camwatch::config))]
    Config(Box<figment::Error>),

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camwatch::validation))]
    Validation { field: String, reason: String },

    #[error("No password configured for camera '{camera}'")]
    #[diagnostic(
        code(camwatch::no_credentials),
        help(
            "Set `password_env` to the name of an environment variable holding\n\
             the camera password (preferred), or set `password` in the config."
        )
    )]
    NoCredentials { camera: String },

    // ── Startup ──────────────────────────────────────────────────────
    #[error("Failed to initialise HTTP client: {message}")]
    #[diagnostic(code(camwatch::client_setup))]
    ClientSetup { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Config(_) | Self::Validation { .. } => exit_code::USAGE,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ClientSetup { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { camera } => CliError::NoCredentials { camera },
            ConfigError::NotFound { path } => CliError::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Figment(err) => CliError::Config(err),
            ConfigError::Io(err) => CliError::Io(err),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            other => CliError::ClientSetup {
                message: other.to_string(),
            },
        }
    }
}
