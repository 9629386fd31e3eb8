// ── Runtime watch configuration ──
//
// These types describe *what* to watch and *where* to report it.
// They carry credential data and timing, but never touch disk.
// `camwatch-config` builds a `WatchConfig` and hands it in.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;

/// Ordered, de-duplicated set of event codes a camera is watched for.
///
/// Order is kept so the attach request lists codes the way they were
/// configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCodes(Vec<String>);

impl EventCodes {
    /// Parse a comma-separated list (`"VideoMotion,AudioMutation"`).
    /// Blank entries are dropped.
    pub fn parse(list: &str) -> Self {
        let mut codes: Vec<String> = Vec::new();
        for code in list.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            if !codes.iter().any(|c| c == code) {
                codes.push(code.to_owned());
            }
        }
        Self(codes)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for EventCodes {
    /// Comma-joined form, as sent in the attach URL.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// Where a camera's tripped state is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorTarget {
    pub host: String,
    pub port: u16,
    pub device_id: String,
}

/// Default Vera `data_request` port.
pub const DEFAULT_ACTUATOR_PORT: u16 = 3480;

/// One watched camera.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Label used in logs (defaults to `"{index}-{host}"`).
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub events: EventCodes,
    pub actuator: ActuatorTarget,
}

/// Timing knobs for the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Quiet period after a Stop before the alarm is cleared.
    pub alarm_delay: Duration,
    /// Flat delay before a dropped camera is reconnected.
    pub reconnect_delay: Duration,
    /// Loop wake-up period for debounce expiry and reconnects.
    pub tick_interval: Duration,
    pub connect_timeout: Duration,
    pub keepalive_idle: Duration,
    pub keepalive_interval: Duration,
    /// Upper bound on one actuator request.
    pub notify_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            alarm_delay: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
            keepalive_idle: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(15),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything the multiplexer needs. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct WatchConfig {
    pub cameras: Vec<CameraConfig>,
    pub timing: Timing,
}

impl Timing {
    /// Transport settings for camera streams.
    pub fn stream_transport(&self) -> camwatch_api::TransportConfig {
        camwatch_api::TransportConfig {
            connect_timeout: self.connect_timeout,
            keepalive_idle: self.keepalive_idle,
            keepalive_interval: self.keepalive_interval,
            request_timeout: None,
        }
    }

    /// Transport settings for actuator calls.
    pub fn notify_transport(&self) -> camwatch_api::TransportConfig {
        self.stream_transport()
            .with_request_timeout(self.notify_timeout)
    }
}
