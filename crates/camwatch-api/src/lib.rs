// camwatch-api: HTTP plumbing for camera event streams and actuator calls

pub mod actuator;
pub mod digest;
pub mod error;
pub mod event_stream;
pub mod transport;

pub use actuator::ActuatorClient;
pub use digest::{DigestChallenge, DigestCredentials};
pub use error::Error;
pub use event_stream::{EventStreamClient, attach_url};
pub use transport::TransportConfig;
