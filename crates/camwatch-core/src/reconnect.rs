// ── Reconnect policy ──
//
// Flat delay after every drop, no backoff, no retry limit. Re-arming is
// guarded by the connection status rather than a counter: a camera already
// waiting to reconnect ignores further drop notifications.

use std::time::Duration;

use tokio::time::Instant;

use crate::connection::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Handle a drop of the camera's current connection.
    ///
    /// Returns the scheduled reconnect instant, or `None` if this drop was
    /// already handled and nothing changed.
    pub fn on_drop(&self, state: &mut ConnectionState, now: Instant) -> Option<Instant> {
        if !state.mark_dropped() {
            return None;
        }
        let at = now + self.delay;
        state.set_pending(at);
        Some(at)
    }

    /// Whether a pending reconnect has come due.
    pub fn is_due(&self, state: &ConnectionState, now: Instant) -> bool {
        state.status().reconnect_at().is_some_and(|at| now >= at)
    }
}
