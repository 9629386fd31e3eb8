// ── Actuator notifications ──
//
// A `Notifier` pushes one alarm transition to the outside world. Delivery
// is best-effort and runs off the watch loop: each camera gets one
// `NotifyQueue` whose worker sends transitions in order and only logs
// failures, so a slow actuator never stalls stream processing.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use camwatch_api::ActuatorClient;

use crate::alarm::AlarmTransition;
use crate::config::{CameraConfig, Timing};
use crate::error::CoreError;

/// Something that can deliver an alarm transition for a camera.
pub trait Notifier: Send + Sync + 'static {
    fn notify(
        &self,
        camera: &CameraConfig,
        transition: AlarmTransition,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Ordered delivery for one camera.
///
/// Transitions are queued and a single worker task sends them one at a
/// time, so a camera's actuator always sees them in the order they
/// happened. The worker exits once the queue is dropped and drained.
pub struct NotifyQueue {
    tx: mpsc::UnboundedSender<AlarmTransition>,
}

impl NotifyQueue {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn spawn<N: Notifier>(notifier: Arc<N>, camera: Arc<CameraConfig>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AlarmTransition>();
        tokio::spawn(async move {
            while let Some(transition) = rx.recv().await {
                match notifier.notify(&camera, transition).await {
                    Ok(()) => tracing::debug!(camera = %camera.name, %transition, "Actuator notified"),
                    Err(e) => tracing::warn!(
                        camera = %camera.name,
                        %transition,
                        error = %e,
                        "Actuator notification failed (dropped)"
                    ),
                }
            }
        });
        Self { tx }
    }

    pub fn push(&self, transition: AlarmTransition) {
        if self.tx.send(transition).is_err() {
            tracing::warn!(%transition, "Notification worker gone, transition dropped");
        }
    }
}

// ── ActuatorNotifier ─────────────────────────────────────────────────

/// Notifier that sets the Vera security sensor's `Tripped` variable.
#[derive(Debug, Clone)]
pub struct ActuatorNotifier {
    client: ActuatorClient,
}

impl ActuatorNotifier {
    pub fn new(timing: &Timing) -> Result<Self, CoreError> {
        Ok(Self {
            client: ActuatorClient::new(&timing.notify_transport())?,
        })
    }

    pub fn with_client(client: ActuatorClient) -> Self {
        Self { client }
    }
}

impl Notifier for ActuatorNotifier {
    async fn notify(
        &self,
        camera: &CameraConfig,
        transition: AlarmTransition,
    ) -> Result<(), CoreError> {
        let target = &camera.actuator;
        self.client
            .set_tripped(
                &target.host,
                target.port,
                &target.device_id,
                transition.is_tripped(),
            )
            .await
            .map_err(|e| match e {
                camwatch_api::Error::UnexpectedStatus { status, .. } => {
                    CoreError::ActuatorRejected { status }
                }
                other => other.into(),
            })
    }
}
