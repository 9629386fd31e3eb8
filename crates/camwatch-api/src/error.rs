use thiserror::Error;

/// Top-level error type for the `camwatch-api` crate.
///
/// Covers every failure mode of the two HTTP surfaces: the camera
/// event-attach stream and the actuator's variable-set call.
/// `camwatch-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The camera rejected our Digest response.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The `WWW-Authenticate` challenge was missing or unusable.
    #[error("Invalid Digest challenge: {0}")]
    DigestChallenge(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, reset, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failed to build the underlying HTTP client.
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    // ── Responses ───────────────────────────────────────────────────
    /// The server answered with a status we can't use.
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}

impl Error {
    /// Returns `true` if this error indicates the credentials were refused.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::UnexpectedStatus { status: 401, .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
