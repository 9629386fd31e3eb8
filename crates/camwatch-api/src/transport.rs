// Shared transport configuration for building reqwest::Client instances.
//
// The camera stream client and the actuator client share connect and
// keepalive settings through this module. They differ only in the total
// request timeout: event-attach streams stay open forever, actuator calls
// must not.

use std::time::Duration;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Idle time before TCP keepalive starts.
    pub keepalive_idle: Duration,
    /// Interval between keepalive packets once the idle time has passed.
    pub keepalive_interval: Duration,
    /// Total request timeout. `None` for long-lived streams.
    pub request_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            keepalive_idle: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(15),
            request_timeout: None,
        }
    }
}

impl TransportConfig {
    /// Config for a bounded request (actuator calls).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(self.keepalive_idle)
            .tcp_keepalive_interval(self.keepalive_interval)
            .user_agent(concat!("camwatch/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .build()
            .map_err(|e| crate::error::Error::ClientSetup(e.to_string()))
    }
}
