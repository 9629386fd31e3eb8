// camwatch-core: Event parsing, alarm debouncing, and the camera connection loop.

pub mod alarm;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod multiplexer;
pub mod notifier;
pub mod parser;
pub mod reconnect;

// ── Primary re-exports ──────────────────────────────────────────────
pub use alarm::{AlarmPhase, AlarmStateMachine, AlarmTransition};
pub use config::{ActuatorTarget, CameraConfig, DEFAULT_ACTUATOR_PORT, EventCodes, Timing, WatchConfig};
pub use connection::{ConnectionId, ConnectionState, ConnectionStatus};
pub use connector::{CameraStream, Connector, HttpConnector};
pub use error::CoreError;
pub use multiplexer::{CameraSnapshot, Multiplexer, StreamEvent, StreamMessage};
pub use notifier::{ActuatorNotifier, Notifier, NotifyQueue};
pub use parser::{AlarmAction, AlarmRecord, EventParser, LineError, LineOutcome};
pub use reconnect::ReconnectPolicy;

// The watch loop takes a token from the caller for shutdown.
pub use tokio_util::sync::CancellationToken;
