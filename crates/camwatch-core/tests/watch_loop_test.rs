// End-to-end tests for the watch loop with an in-memory connector and
// paused tokio time.
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use secrecy::SecretString;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::Instant;

use camwatch_core::{
    ActuatorTarget, AlarmTransition, CameraConfig, CameraStream, CancellationToken, Connector,
    CoreError, EventCodes, Multiplexer, Notifier, Timing, WatchConfig,
};

// ── Test doubles ────────────────────────────────────────────────────

type Feed = UnboundedReceiver<Result<Bytes, CoreError>>;

enum Attempt {
    Refuse,
    Stream(Feed),
    /// Sends the given lines, then boundary lines without pause.
    Flood(&'static [&'static str]),
}

/// Hands out scripted attempts in order; once exhausted every further
/// attempt yields a stream that never produces anything.
struct ScriptedConnector {
    script: Mutex<VecDeque<Attempt>>,
    attempts: UnboundedSender<Instant>,
}

impl Connector for ScriptedConnector {
    async fn connect(&self, _camera: &CameraConfig) -> Result<CameraStream, CoreError> {
        let _ = self.attempts.send(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Attempt::Refuse) => Err(CoreError::ConnectionFailed {
                target: "cam.local:80".into(),
                reason: "connection refused".into(),
            }),
            Some(Attempt::Stream(feed)) => Ok(Box::pin(futures_util::stream::unfold(
                feed,
                |mut feed| async move { feed.recv().await.map(|item| (item, feed)) },
            ))),
            Some(Attempt::Flood(lines)) => Ok(Box::pin(
                futures_util::stream::iter(lines.iter().copied().map(line))
                    .chain(futures_util::stream::repeat_with(|| line("--myboundary\r\n"))),
            )),
            None => Ok(Box::pin(futures_util::stream::pending())),
        }
    }
}

/// Records each transition once delivered. `clear_delay` makes the
/// actuator slow to acknowledge a clear.
struct RecordingNotifier {
    tx: UnboundedSender<(String, AlarmTransition, Instant)>,
    clear_delay: Duration,
}

impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        camera: &CameraConfig,
        transition: AlarmTransition,
    ) -> Result<(), CoreError> {
        if transition == AlarmTransition::Cleared && !self.clear_delay.is_zero() {
            tokio::time::sleep(self.clear_delay).await;
        }
        let _ = self.tx.send((camera.name.clone(), transition, Instant::now()));
        Ok(())
    }
}

struct Harness {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
    attempts: UnboundedReceiver<Instant>,
    notified: UnboundedReceiver<(String, AlarmTransition, Instant)>,
}

impl Harness {
    fn start(script: Vec<Attempt>) -> Self {
        Self::start_with(script, Timing::default(), Duration::ZERO)
    }

    fn start_with(script: Vec<Attempt>, timing: Timing, clear_delay: Duration) -> Self {
        let (attempts_tx, attempts) = unbounded_channel();
        let (notified_tx, notified) = unbounded_channel();

        let connector = ScriptedConnector {
            script: Mutex::new(script.into()),
            attempts: attempts_tx,
        };
        let notifier = RecordingNotifier {
            tx: notified_tx,
            clear_delay,
        };
        let config = WatchConfig {
            cameras: vec![camera()],
            timing,
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Multiplexer::new(config, connector, notifier).run(cancel.clone()));
        Self {
            cancel,
            task,
            attempts,
            notified,
        }
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.task.await.unwrap();
    }
}

fn camera() -> CameraConfig {
    CameraConfig {
        name: "driveway".into(),
        host: "cam.local".into(),
        port: 80,
        username: "admin".into(),
        password: SecretString::from("secret"),
        events: EventCodes::parse("VideoMotion,CrossLineDetection"),
        actuator: ActuatorTarget {
            host: "vera.local".into(),
            port: 3480,
            device_id: "42".into(),
        },
    }
}

fn line(text: &'static str) -> Result<Bytes, CoreError> {
    Ok(Bytes::from_static(text.as_bytes()))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_then_stop_reports_true_then_false_after_delay() {
    let (feed, rx) = unbounded_channel();
    let mut h = Harness::start(vec![Attempt::Stream(rx)]);
    let t0 = Instant::now();

    feed.send(line("HTTP/1.1 200 OK\r\n")).unwrap();
    feed.send(line("--myboundary\r\nContent-Type: text/plain\r\n\r\n")).unwrap();
    feed.send(line("Code=VideoMotion;action=Start;index=0\r\n")).unwrap();

    let (name, transition, at) = h.notified.recv().await.unwrap();
    assert_eq!(name, "driveway");
    assert_eq!(transition, AlarmTransition::Tripped);
    assert!(at - t0 < Duration::from_secs(1));

    tokio::time::sleep(Duration::from_secs(2)).await;
    feed.send(line("Code=VideoMotion;action=Stop;index=0\r\n")).unwrap();

    let (_, transition, at) = h.notified.recv().await.unwrap();
    assert_eq!(transition, AlarmTransition::Cleared);
    let elapsed = at - t0;
    assert!(
        elapsed >= Duration::from_secs(32) && elapsed <= Duration::from_secs(34),
        "cleared after {elapsed:?}"
    );

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn restart_within_delay_keeps_alarm_active() {
    let (feed, rx) = unbounded_channel();
    let mut h = Harness::start(vec![Attempt::Stream(rx)]);

    feed.send(line("Code=VideoMotion;action=Start;index=0\r\n")).unwrap();
    assert_eq!(h.notified.recv().await.unwrap().1, AlarmTransition::Tripped);

    feed.send(line("Code=VideoMotion;action=Stop;index=0\r\n")).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    feed.send(line("Code=CrossLineDetection;action=Start;index=0\r\n")).unwrap();

    // Re-entering Active from cooldown is reported again, never a false.
    assert_eq!(h.notified.recv().await.unwrap().1, AlarmTransition::Tripped);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(h.notified.try_recv().is_err());

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unmonitored_codes_and_garbage_are_ignored() {
    let (feed, rx) = unbounded_channel();
    let mut h = Harness::start(vec![Attempt::Stream(rx)]);

    feed.send(line("Code=AudioMutation;action=Start;index=0\r\n")).unwrap();
    feed.send(line("Code=VideoMotion;nonsense\r\n")).unwrap();
    feed.send(line("Code=VideoMotion;action=Pulse;index=0\r\n")).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.notified.try_recv().is_err());

    // Split across chunks, still one event.
    feed.send(line("Code=VideoMo")).unwrap();
    feed.send(line("tion;action=Start;index=0\r")).unwrap();
    feed.send(line("\n")).unwrap();
    assert_eq!(h.notified.recv().await.unwrap().1, AlarmTransition::Tripped);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn closed_stream_reconnects_after_five_seconds() {
    let (first, first_rx) = unbounded_channel();
    let (second, second_rx) = unbounded_channel();
    let mut h = Harness::start(vec![Attempt::Stream(first_rx), Attempt::Stream(second_rx)]);

    let t0 = h.attempts.recv().await.unwrap();
    first.send(line("HTTP/1.1 200 OK\r\n")).unwrap();
    drop(first);

    let t1 = h.attempts.recv().await.unwrap();
    let gap = t1 - t0;
    assert!(
        gap >= Duration::from_secs(5) && gap < Duration::from_secs(7),
        "reconnected after {gap:?}"
    );

    // Events on the new connection are processed.
    second.send(line("Code=VideoMotion;action=Start;index=0\r\n")).unwrap();
    assert_eq!(h.notified.recv().await.unwrap().1, AlarmTransition::Tripped);

    // Nothing else dropped, so no further attempts.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.attempts.try_recv().is_err());

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn refused_connection_is_retried_indefinitely() {
    let mut h = Harness::start(vec![Attempt::Refuse, Attempt::Refuse, Attempt::Refuse]);

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(h.attempts.recv().await.unwrap());
    }
    for pair in seen.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(5) && gap < Duration::from_secs(7), "gap {gap:?}");
    }

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stream_error_mid_alarm_keeps_alarm_state() {
    let (feed, rx) = unbounded_channel();
    let mut h = Harness::start(vec![Attempt::Stream(rx)]);

    feed.send(line("Code=VideoMotion;action=Start;index=0\r\n")).unwrap();
    assert_eq!(h.notified.recv().await.unwrap().1, AlarmTransition::Tripped);

    feed.send(Err(CoreError::StreamInterrupted {
        reason: "connection reset".into(),
    }))
    .unwrap();

    // Alarm stays active across the reconnect; no false without a Stop.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(h.notified.try_recv().is_err());

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slow_clear_is_still_reported_before_next_trip() {
    let (feed, rx) = unbounded_channel();
    let mut h = Harness::start_with(
        vec![Attempt::Stream(rx)],
        Timing::default(),
        Duration::from_secs(5),
    );
    let t0 = Instant::now();

    feed.send(line("Code=VideoMotion;action=Start;index=0\r\n")).unwrap();
    feed.send(line("Code=VideoMotion;action=Stop;index=0\r\n")).unwrap();
    assert_eq!(h.notified.recv().await.unwrap().1, AlarmTransition::Tripped);

    // The clear goes out around 31s and takes 5s to land; new motion
    // arrives while it is still in flight.
    tokio::time::sleep_until(t0 + Duration::from_secs(33)).await;
    feed.send(line("Code=VideoMotion;action=Start;index=0\r\n")).unwrap();

    let (_, second, cleared_at) = h.notified.recv().await.unwrap();
    let (_, third, tripped_at) = h.notified.recv().await.unwrap();
    assert_eq!(second, AlarmTransition::Cleared);
    assert_eq!(third, AlarmTransition::Tripped);
    assert!(tripped_at >= cleared_at);

    h.stop().await;
}

#[tokio::test]
async fn busy_stream_does_not_hold_back_cooldown_expiry() {
    let timing = Timing {
        alarm_delay: Duration::from_millis(200),
        tick_interval: Duration::from_millis(20),
        ..Timing::default()
    };
    let mut h = Harness::start_with(
        vec![Attempt::Flood(&[
            "Code=VideoMotion;action=Start;index=0\r\n",
            "Code=VideoMotion;action=Stop;index=0\r\n",
        ])],
        timing,
        Duration::ZERO,
    );

    assert_eq!(h.notified.recv().await.unwrap().1, AlarmTransition::Tripped);
    let cleared = tokio::time::timeout(Duration::from_secs(10), h.notified.recv())
        .await
        .expect("cooldown never expired while the stream was busy")
        .unwrap();
    assert_eq!(cleared.1, AlarmTransition::Cleared);

    h.stop().await;
}
