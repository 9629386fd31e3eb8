// ── Camera stream connector ──
//
// The multiplexer doesn't speak HTTP itself. It asks a `Connector` for a
// byte stream per camera; `HttpConnector` is the real one, tests plug in
// an in-memory implementation.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;

use camwatch_api::{DigestCredentials, EventStreamClient, attach_url};

use crate::config::{CameraConfig, Timing};
use crate::error::CoreError;

/// Body of an attached camera stream.
pub type CameraStream = Pin<Box<dyn Stream<Item = Result<Bytes, CoreError>> + Send>>;

/// Opens the event stream for one camera.
///
/// Resolves once the camera has accepted the request; the stream then
/// yields body chunks until the connection closes (`None`) or fails.
pub trait Connector: Send + Sync + 'static {
    fn connect(
        &self,
        camera: &CameraConfig,
    ) -> impl Future<Output = Result<CameraStream, CoreError>> + Send;
}

/// Digest-authenticated HTTP connector.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: EventStreamClient,
}

impl HttpConnector {
    pub fn new(timing: &Timing) -> Result<Self, CoreError> {
        Ok(Self {
            client: EventStreamClient::new(&timing.stream_transport())?,
        })
    }

    pub fn with_client(client: EventStreamClient) -> Self {
        Self { client }
    }
}

impl Connector for HttpConnector {
    async fn connect(&self, camera: &CameraConfig) -> Result<CameraStream, CoreError> {
        let url = attach_url(&camera.host, camera.port, &camera.events.to_string())?;
        let credentials = DigestCredentials::new(camera.username.clone(), camera.password.clone());

        let body = self.client.open(&url, &credentials).await?;
        Ok(Box::pin(body.map(|chunk| chunk.map_err(CoreError::from))))
    }
}
