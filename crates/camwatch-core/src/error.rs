// ── Core error types ──
//
// Domain errors from camwatch-core. Everything here is non-fatal to the
// watcher: connection failures feed the reconnect policy and notification
// failures are logged and dropped. The `From<camwatch_api::Error>` impl
// translates transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Stream interrupted: {reason}")]
    StreamInterrupted { reason: String },

    #[error("Connection timed out")]
    Timeout,

    // ── Actuator errors ──────────────────────────────────────────────
    #[error("Actuator rejected request (HTTP {status})")]
    ActuatorRejected { status: u16 },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<camwatch_api::Error> for CoreError {
    fn from(err: camwatch_api::Error) -> Self {
        match err {
            camwatch_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            camwatch_api::Error::DigestChallenge(reason) => CoreError::AuthenticationFailed {
                message: format!("unusable challenge: {reason}"),
            },
            camwatch_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        target: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::StreamInterrupted {
                        reason: e.to_string(),
                    }
                }
            }
            camwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            camwatch_api::Error::ClientSetup(message) => CoreError::Config { message },
            camwatch_api::Error::UnexpectedStatus { status: 401, .. } => {
                CoreError::AuthenticationFailed {
                    message: "HTTP 401".into(),
                }
            }
            camwatch_api::Error::UnexpectedStatus { status, url } => CoreError::ConnectionFailed {
                target: url,
                reason: format!("HTTP {status}"),
            },
        }
    }
}
