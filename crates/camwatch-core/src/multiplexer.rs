//! Connection multiplexer: one long-lived event stream per camera.
//!
//! A single loop task owns every camera's connection state, line parser
//! and alarm state machine. Each connection attempt runs a small reader
//! task that only forwards what it sees (connected / data / closed /
//! failed) over an mpsc channel, tagged with its [`ConnectionId`]. The loop
//! routes each message to its camera through a map populated at start, so
//! per-camera ordering is exactly arrival order and no state is shared.
//!
//! A periodic tick expires alarm cooldowns and fires due reconnects even
//! when no camera is sending anything.
//!
//! Alarm transitions go to a per-camera [`NotifyQueue`], which delivers
//! them in order on its own task.
//!
//! # Example
//!
//! ```rust,ignore
//! use camwatch_core::{ActuatorNotifier, HttpConnector, Multiplexer};
//! use tokio_util::sync::CancellationToken;
//!
//! let connector = HttpConnector::new(&config.timing)?;
//! let notifier = ActuatorNotifier::new(&config.timing)?;
//! let cancel = CancellationToken::new();
//!
//! Multiplexer::new(config, connector, notifier).run(cancel).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alarm::{AlarmPhase, AlarmStateMachine, AlarmTransition};
use crate::config::{CameraConfig, WatchConfig};
use crate::connection::{ConnectionId, ConnectionState, ConnectionStatus};
use crate::connector::Connector;
use crate::error::CoreError;
use crate::notifier::{Notifier, NotifyQueue};
use crate::parser::{EventParser, LineOutcome};
use crate::reconnect::ReconnectPolicy;

const MESSAGE_CHANNEL_CAPACITY: usize = 1024;

// ── Reader → loop messages ───────────────────────────────────────────

/// What a reader task observed on its connection.
#[derive(Debug)]
pub enum StreamEvent {
    /// The camera accepted the attach request.
    Connected,
    /// A chunk of body bytes.
    Data(Bytes),
    /// The camera ended the response cleanly.
    Closed,
    /// The attempt or the stream failed.
    Failed(CoreError),
}

#[derive(Debug)]
pub struct StreamMessage {
    pub connection: ConnectionId,
    pub event: StreamEvent,
}

// ── Snapshots ────────────────────────────────────────────────────────

/// Point-in-time view of one camera, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSnapshot {
    pub name: String,
    pub connection: ConnectionStatus,
    pub alarm: AlarmPhase,
}

// ── Multiplexer ──────────────────────────────────────────────────────

struct CameraSlot {
    config: Arc<CameraConfig>,
    connection: ConnectionState,
    alarm: AlarmStateMachine,
    parser: EventParser,
    outbox: Option<NotifyQueue>,
}

impl CameraSlot {
    /// Queue a transition for this camera's actuator, starting the
    /// delivery worker on first use.
    fn notify<N: Notifier>(&mut self, notifier: &Arc<N>, transition: AlarmTransition) {
        if self.outbox.is_none() {
            self.outbox = Some(NotifyQueue::spawn(
                Arc::clone(notifier),
                Arc::clone(&self.config),
            ));
        }
        if let Some(outbox) = &self.outbox {
            outbox.push(transition);
        }
    }
}

/// Owns all camera connections and drives the watch loop.
pub struct Multiplexer<C, N> {
    cameras: Vec<CameraSlot>,
    routes: HashMap<ConnectionId, usize>,
    next_connection: u64,
    policy: ReconnectPolicy,
    tick_interval: Duration,
    connect_timeout: Duration,
    connector: Arc<C>,
    notifier: Arc<N>,
    tx: mpsc::Sender<StreamMessage>,
    rx: mpsc::Receiver<StreamMessage>,
}

impl<C: Connector, N: Notifier> Multiplexer<C, N> {
    /// Register every configured camera. Nothing connects until
    /// [`run`](Self::run) (or [`start`](Self::start)) is called.
    pub fn new(config: WatchConfig, connector: C, notifier: N) -> Self {
        let WatchConfig { cameras, timing } = config;
        let (tx, rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);

        let cameras = cameras
            .into_iter()
            .map(|camera| {
                let config = Arc::new(camera);
                CameraSlot {
                    alarm: AlarmStateMachine::new(Arc::clone(&config), timing.alarm_delay),
                    config,
                    connection: ConnectionState::new(),
                    parser: EventParser::new(),
                    outbox: None,
                }
            })
            .collect();

        Self {
            cameras,
            routes: HashMap::new(),
            next_connection: 0,
            policy: ReconnectPolicy::new(timing.reconnect_delay),
            tick_interval: timing.tick_interval,
            connect_timeout: timing.connect_timeout,
            connector: Arc::new(connector),
            notifier: Arc::new(notifier),
            tx,
            rx,
        }
    }

    pub fn snapshot(&self) -> Vec<CameraSnapshot> {
        self.cameras
            .iter()
            .map(|slot| CameraSnapshot {
                name: slot.config.name.clone(),
                connection: slot.connection.status(),
                alarm: slot.alarm.phase(),
            })
            .collect()
    }

    /// Run until `cancel` fires. Without cancellation this never returns.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(cameras = self.cameras.len(), "Starting camera watch loop");

        for index in 0..self.cameras.len() {
            self.start(index);
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Ticks ahead of messages: a busy stream must not starve
                // cooldown expiry or due reconnects.
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => self.on_tick(Instant::now()),
                Some(message) = self.rx.recv() => {
                    self.handle_message(message, Instant::now());
                }
            }
        }

        for slot in &mut self.cameras {
            slot.connection.detach();
        }
        tracing::info!("Camera watch loop stopped");
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Open (or reopen) the connection for camera `index`, detaching any
    /// previous one.
    pub fn start(&mut self, index: usize) {
        let Some(slot) = self.cameras.get_mut(index) else {
            return;
        };

        self.next_connection += 1;
        let id = ConnectionId(self.next_connection);

        let reader = tokio::spawn(read_connection(
            Arc::clone(&self.connector),
            Arc::clone(&slot.config),
            id,
            self.connect_timeout,
            self.tx.clone(),
        ));

        if let Some(stale) = slot.connection.begin(id, Some(reader.abort_handle())) {
            self.routes.remove(&stale);
        }
        slot.parser.reset();
        self.routes.insert(id, index);

        tracing::info!(
            camera = %slot.config.name,
            host = %slot.config.host,
            connection = %id,
            "Connecting to camera"
        );
    }

    /// Apply one reader message.
    pub fn handle_message(&mut self, message: StreamMessage, now: Instant) {
        let Some(&index) = self.routes.get(&message.connection) else {
            tracing::trace!(connection = %message.connection, "Dropping message from stale connection");
            return;
        };

        match message.event {
            StreamEvent::Connected => self.on_connected(index),
            StreamEvent::Data(bytes) => self.on_data(index, &bytes, now),
            StreamEvent::Closed => self.on_drop(index, "stream closed by camera", now),
            StreamEvent::Failed(e) => self.on_drop(index, &e.to_string(), now),
        }
    }

    /// Periodic work: expire alarm cooldowns, fire due reconnects.
    pub fn on_tick(&mut self, now: Instant) {
        let mut due = Vec::new();

        for (index, slot) in self.cameras.iter_mut().enumerate() {
            if let Some(transition) = slot.alarm.on_tick(now) {
                tracing::info!(camera = %slot.config.name, %transition, "Alarm cleared");
                slot.notify(&self.notifier, transition);
            }
            if self.policy.is_due(&slot.connection, now) {
                due.push(index);
            }
        }

        for index in due {
            self.start(index);
        }
    }

    fn on_connected(&mut self, index: usize) {
        let Some(slot) = self.cameras.get_mut(index) else {
            return;
        };
        if slot.connection.mark_connected() {
            tracing::info!(camera = %slot.config.name, "Camera connected");
        }
    }

    fn on_data(&mut self, index: usize, bytes: &[u8], now: Instant) {
        let outcomes = match self.cameras.get_mut(index) {
            Some(slot) => slot.parser.feed(bytes),
            None => return,
        };

        for outcome in outcomes {
            match outcome {
                LineOutcome::Connected => self.on_connected(index),
                LineOutcome::Alarm(record) => {
                    let Some(slot) = self.cameras.get_mut(index) else {
                        return;
                    };
                    tracing::debug!(
                        camera = %slot.config.name,
                        code = %record.code,
                        action = %record.action,
                        fields = ?record.fields,
                        "Alarm event"
                    );
                    if let Some(transition) = slot.alarm.on_record(&record, now) {
                        tracing::info!(camera = %slot.config.name, %transition, "Motion detected");
                        slot.notify(&self.notifier, transition);
                    }
                }
                LineOutcome::Malformed { line, error } => {
                    let name = self
                        .cameras
                        .get(index)
                        .map_or("<unknown>", |slot| slot.config.name.as_str());
                    tracing::warn!(camera = %name, %line, %error, "Skipping malformed event line");
                }
                LineOutcome::Ignored => {}
            }
        }
    }

    fn on_drop(&mut self, index: usize, reason: &str, now: Instant) {
        let Some(slot) = self.cameras.get_mut(index) else {
            return;
        };
        match self.policy.on_drop(&mut slot.connection, now) {
            Some(_) => {
                tracing::warn!(
                    camera = %slot.config.name,
                    reason,
                    retry_in_ms = u64::try_from(self.policy.delay().as_millis()).unwrap_or(u64::MAX),
                    "Camera disconnected, reconnect scheduled"
                );
            }
            None => {
                tracing::debug!(camera = %slot.config.name, reason, "Drop already handled");
            }
        }
    }
}

// ── Reader task ──────────────────────────────────────────────────────

/// Open one connection and forward everything it yields. Always ends with
/// exactly one `Closed` or `Failed` unless the loop has gone away.
async fn read_connection<C: Connector>(
    connector: Arc<C>,
    camera: Arc<CameraConfig>,
    connection: ConnectionId,
    connect_timeout: Duration,
    tx: mpsc::Sender<StreamMessage>,
) {
    let send = |event| tx.send(StreamMessage { connection, event });

    let attempt = tokio::time::timeout(connect_timeout, connector.connect(&camera)).await;
    let mut stream = match attempt {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            let _ = send(StreamEvent::Failed(e)).await;
            return;
        }
        Err(_) => {
            let _ = send(StreamEvent::Failed(CoreError::Timeout)).await;
            return;
        }
    };

    if send(StreamEvent::Connected).await.is_err() {
        return;
    }

    while let Some(chunk) = stream.next().await {
        let event = match chunk {
            Ok(bytes) => StreamEvent::Data(bytes),
            Err(e) => {
                let _ = send(StreamEvent::Failed(e)).await;
                return;
            }
        };
        if send(event).await.is_err() {
            return;
        }
    }

    let _ = send(StreamEvent::Closed).await;
}

// ── Tests ────────────────────────────────────────────────────────────
