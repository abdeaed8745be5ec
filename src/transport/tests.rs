//! Integration tests for the connection manager.
//!
//! All tests run against scripted fake connectors on a paused clock, so
//! the backoff schedule is asserted exactly, without real sockets or
//! real time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::*;
use crate::StreamError;

/// A scripted link backed by channels: the test plays the remote end.
struct ScriptLink {
    rx: mpsc::UnboundedReceiver<String>,
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait::async_trait]
impl Link for ScriptLink {
    async fn send(&mut self, text: String) -> crate::Result<()> {
        self.sent.send(text).map_err(|_| StreamError::channel_closed("script link"))
    }

    async fn recv(&mut self) -> Option<crate::Result<String>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {}
}

/// Remote-end handles for one scripted link.
struct RemoteEnd {
    push: mpsc::UnboundedSender<String>,
    sent: mpsc::UnboundedReceiver<String>,
}

fn script_link() -> (ScriptLink, RemoteEnd) {
    let (push, rx) = mpsc::unbounded_channel();
    let (sent_tx, sent) = mpsc::unbounded_channel();
    (ScriptLink { rx, sent: sent_tx }, RemoteEnd { push, sent })
}

enum Outcome {
    Fail,
    Open(ScriptLink),
}

/// Plays back a fixed sequence of connect outcomes, recording the
/// (paused-clock) instant of every attempt. Outcomes past the end of
/// the script fail.
struct ScriptConnector {
    outcomes: Mutex<VecDeque<Outcome>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptConnector {
    fn new(outcomes: Vec<Outcome>) -> (Self, Arc<Mutex<Vec<Instant>>>) {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        (Self { outcomes: Mutex::new(outcomes.into()), attempts: attempts.clone() }, attempts)
    }

    fn failing() -> (Self, Arc<Mutex<Vec<Instant>>>) {
        Self::new(Vec::new())
    }
}

#[async_trait::async_trait]
impl Connector for ScriptConnector {
    type Link = ScriptLink;

    async fn connect(&self, url: &str) -> crate::Result<ScriptLink> {
        self.attempts.lock().unwrap().push(Instant::now());
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Outcome::Open(link)) => Ok(link),
            Some(Outcome::Fail) | None => Err(StreamError::connection_failed(url, "refused")),
        }
    }
}

/// A connector whose connect never resolves.
struct PendingConnector;

#[async_trait::async_trait]
impl Connector for PendingConnector {
    type Link = ScriptLink;

    async fn connect(&self, _url: &str) -> crate::Result<ScriptLink> {
        std::future::pending().await
    }
}

async fn wait_for_state(
    state: &mut tokio::sync::watch::Receiver<ConnectionState>,
    target: ConnectionState,
) {
    loop {
        if *state.borrow() == target {
            return;
        }
        state.changed().await.expect("state channel closed before reaching target");
    }
}

#[test]
fn linear_backoff_delays() {
    let policy = ReconnectPolicy::default();
    assert_eq!(policy.delay(1), Duration::from_millis(1000));
    assert_eq!(policy.delay(3), Duration::from_millis(3000));
    assert_eq!(policy.delay(5), Duration::from_millis(5000));
}

#[tokio::test(start_paused = true)]
async fn backoff_schedule_runs_then_fails_terminally() {
    let _ = tracing_subscriber::fmt::try_init();

    let (connector, attempts) = ScriptConnector::failing();
    let mut channels =
        ConnectionManager::spawn(connector, "ws://test/ws/movement", ReconnectPolicy::default());

    wait_for_state(&mut channels.state, ConnectionState::Failed).await;

    // Initial attempt plus five retries.
    let recorded = attempts.lock().unwrap().clone();
    assert_eq!(recorded.len(), 6);

    // The nth retry is scheduled n * base_delay after the prior failure.
    for n in 1..recorded.len() {
        let gap = recorded[n] - recorded[n - 1];
        assert_eq!(gap, Duration::from_millis(1000 * n as u64), "retry {n} gap");
    }

    // Terminal: no further attempts, ever.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(attempts.lock().unwrap().len(), 6);

    // The inbound channel ends with the task.
    assert!(channels.inbound.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_attempt_count() {
    let (link, remote) = script_link();
    let (connector, attempts) =
        ScriptConnector::new(vec![Outcome::Fail, Outcome::Open(link)]);
    let mut channels =
        ConnectionManager::spawn(connector, "ws://test/ws/movement", ReconnectPolicy::default());

    wait_for_state(&mut channels.state, ConnectionState::Open).await;
    assert_eq!(attempts.lock().unwrap().len(), 2);

    // Hold the connection open for a while, then drop the remote end.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let dropped_at = Instant::now();
    drop(remote);

    wait_for_state(&mut channels.state, ConnectionState::Failed).await;

    // The first retry after the drop waits 1 * base_delay again: the
    // successful open reset the attempt counter.
    let recorded = attempts.lock().unwrap().clone();
    assert_eq!(recorded[2] - dropped_at, Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn send_drops_silently_unless_open() {
    let channels = ConnectionManager::spawn(
        PendingConnector,
        "ws://test/ws/movement",
        ReconnectPolicy::default(),
    );

    assert_eq!(*channels.state.borrow(), ConnectionState::Connecting);

    // Nothing to assert beyond "does not panic, does not buffer": the
    // connect never resolves, so a buffered message could never be
    // flushed anyway.
    channels.sender.send("frame".to_string());
    channels.sender.send("frame".to_string());
    assert_eq!(channels.sender.state(), ConnectionState::Connecting);

    channels.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn messages_flow_both_ways_while_open() {
    let (link, mut remote) = script_link();
    let (connector, _) = ScriptConnector::new(vec![Outcome::Open(link)]);
    let mut channels =
        ConnectionManager::spawn(connector, "ws://test/ws/movement", ReconnectPolicy::default());

    wait_for_state(&mut channels.state, ConnectionState::Open).await;

    channels.sender.send("outbound".to_string());
    assert_eq!(remote.sent.recv().await.unwrap(), "outbound");

    remote.push.send("inbound".to_string()).unwrap();
    assert_eq!(channels.inbound.recv().await.unwrap(), "inbound");
}

#[tokio::test(start_paused = true)]
async fn disconnect_suppresses_pending_reconnect() {
    let (connector, attempts) = ScriptConnector::failing();
    let mut channels =
        ConnectionManager::spawn(connector, "ws://test/ws/movement", ReconnectPolicy::default());

    // Let the first attempt fail and the backoff timer start.
    wait_for_state(&mut channels.state, ConnectionState::Reconnecting).await;
    let before = attempts.lock().unwrap().len();

    channels.cancel.cancel();
    wait_for_state(&mut channels.state, ConnectionState::Closed).await;

    // The pending reconnect must not fire after deliberate teardown.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(attempts.lock().unwrap().len(), before);

    // Teardown is idempotent.
    channels.cancel.cancel();
    assert_eq!(*channels.state.borrow(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn deliberate_close_while_open_does_not_reconnect() {
    let (link, _remote) = script_link();
    let (connector, attempts) = ScriptConnector::new(vec![Outcome::Open(link)]);
    let mut channels =
        ConnectionManager::spawn(connector, "ws://test/ws/movement", ReconnectPolicy::default());

    wait_for_state(&mut channels.state, ConnectionState::Open).await;
    channels.cancel.cancel();
    wait_for_state(&mut channels.state, ConnectionState::Closed).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(attempts.lock().unwrap().len(), 1);
}
