//! Camera event-attach stream.
//!
//! Opens the long-lived `eventManager.cgi?action=attach` response on a
//! camera, answering the Digest challenge on the way, and hands back the
//! raw body as a byte stream. Line framing and event parsing happen in
//! `camwatch-core`; this module only cares about getting bytes flowing.
//!
//! # Example
//!
//! ```rust,ignore
//! use camwatch_api::{attach_url, DigestCredentials, EventStreamClient, TransportConfig};
//! use futures_util::StreamExt;
//!
//! let client = EventStreamClient::new(&TransportConfig::default())?;
//! let url = attach_url("192.168.1.20", 80, "VideoMotion,AudioMutation")?;
//! let mut body = client.open(&url, &credentials).await?;
//!
//! while let Some(chunk) = body.next().await {
//!     print!("{}", String::from_utf8_lossy(&chunk?));
//! }
//! ```

use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use url::Url;

use crate::digest::{DigestChallenge, DigestCredentials, new_cnonce};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw body of an attached event stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Build the event-attach URL for a camera.
///
/// `codes` is the comma-separated event list; the surrounding brackets are
/// sent percent-encoded as the firmware expects.
pub fn attach_url(host: &str, port: u16, codes: &str) -> Result<Url, Error> {
    let raw = format!(
        "http://{host}:{port}/cgi-bin/eventManager.cgi?action=attach&codes=%5B{codes}%5D"
    );
    Ok(Url::parse(&raw)?)
}

// ── EventStreamClient ────────────────────────────────────────────────

/// HTTP client for opening camera event streams.
///
/// Built without a total request timeout: the response body is expected to
/// stay open indefinitely. Connect timeout and keepalive come from the
/// [`TransportConfig`].
#[derive(Debug, Clone)]
pub struct EventStreamClient {
    http: reqwest::Client,
}

impl EventStreamClient {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        let mut transport = transport.clone();
        transport.request_timeout = None;
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// Wrap a pre-built `reqwest::Client` (used by tests).
    pub fn from_reqwest(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Open the stream, performing the Digest handshake if challenged.
    ///
    /// Returns once the camera has answered `2xx`; the returned stream yields
    /// body chunks until the camera closes the connection or it fails.
    pub async fn open(
        &self,
        url: &Url,
        credentials: &DigestCredentials,
    ) -> Result<ByteStream, Error> {
        tracing::debug!(url = %url, "Opening event stream");

        let response = self.http.get(url.clone()).send().await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = DigestChallenge::from_headers(response.headers())?;
            drop(response);

            let authorization =
                challenge.authorization(credentials, "GET", &request_target(url), 1, &new_cnonce());

            let retry = self
                .http
                .get(url.clone())
                .header(AUTHORIZATION, authorization)
                .send()
                .await?;

            if retry.status() == StatusCode::UNAUTHORIZED {
                return Err(Error::Authentication {
                    message: format!("camera rejected credentials for user '{}'", credentials.username),
                });
            }
            retry
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        tracing::debug!(url = %url, status = status.as_u16(), "Event stream attached");

        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(Error::from))))
    }
}

/// Path plus query, as it appears on the request line.
fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_owned(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
