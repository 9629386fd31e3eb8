// ── Per-camera alarm debouncing ──
//
// Turns a noisy stream of Start/Stop records into a stable tripped flag.
// A Start trips the alarm immediately; a Stop only starts a cooldown, and
// the alarm clears once a tick observes the cooldown has outlived the
// configured delay without another Start.

use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tokio::time::Instant;

use crate::config::CameraConfig;
use crate::parser::{AlarmAction, AlarmRecord};

/// Debounce phase. `Idle` means no event has been seen since the last
/// reset; `stopped_at` exists only while cooling down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPhase {
    Idle,
    Active,
    Cooldown { stopped_at: Instant },
}

impl AlarmPhase {
    /// Tri-state view: `None` = unknown, `Some(true)` = active,
    /// `Some(false)` = stopped and cooling down.
    pub fn active(&self) -> Option<bool> {
        match self {
            Self::Idle => None,
            Self::Active => Some(true),
            Self::Cooldown { .. } => Some(false),
        }
    }

    pub fn last_stop(&self) -> Option<Instant> {
        match self {
            Self::Cooldown { stopped_at } => Some(*stopped_at),
            _ => None,
        }
    }
}

/// Signal to push to the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AlarmTransition {
    #[strum(to_string = "tripped")]
    Tripped,
    #[strum(to_string = "cleared")]
    Cleared,
}

impl AlarmTransition {
    pub fn is_tripped(self) -> bool {
        matches!(self, Self::Tripped)
    }
}

/// Debounce state for one camera.
#[derive(Debug)]
pub struct AlarmStateMachine {
    camera: Arc<CameraConfig>,
    delay: Duration,
    phase: AlarmPhase,
}

impl AlarmStateMachine {
    pub fn new(camera: Arc<CameraConfig>, delay: Duration) -> Self {
        Self {
            camera,
            delay,
            phase: AlarmPhase::Idle,
        }
    }

    pub fn phase(&self) -> AlarmPhase {
        self.phase
    }

    /// Apply one alarm record observed at `now`.
    pub fn on_record(&mut self, record: &AlarmRecord, now: Instant) -> Option<AlarmTransition> {
        if !self.camera.events.contains(&record.code) {
            tracing::trace!(camera = %self.camera.name, code = %record.code, "Ignoring unmonitored code");
            return None;
        }

        match record.action {
            AlarmAction::Start => {
                if self.phase == AlarmPhase::Active {
                    return None;
                }
                self.phase = AlarmPhase::Active;
                Some(AlarmTransition::Tripped)
            }
            AlarmAction::Stop => {
                self.phase = AlarmPhase::Cooldown { stopped_at: now };
                None
            }
        }
    }

    /// Periodic check; clears the alarm once the cooldown has run out.
    pub fn on_tick(&mut self, now: Instant) -> Option<AlarmTransition> {
        let AlarmPhase::Cooldown { stopped_at } = self.phase else {
            return None;
        };
        if now.saturating_duration_since(stopped_at) > self.delay {
            self.phase = AlarmPhase::Idle;
            Some(AlarmTransition::Cleared)
        } else {
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
