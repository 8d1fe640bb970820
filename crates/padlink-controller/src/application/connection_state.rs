//! ConnectionState: the connection lifecycle state machine.
//!
//! Wraps an asynchronous, notification-driven [`Transport`] behind a
//! synchronous contract: `connect` blocks until the handshake resolves,
//! `send` never blocks, and inbound messages / closure are delivered through
//! registered callbacks.
//!
//! # State diagram
//!
//! ```text
//!               connect()
//!   (any) ──────────────────►  Opening ──opened──►  Opened
//!                                 │                  │  │
//!                              failed             closed failed / send error
//!                                 ▼                  ▼  ▼
//!                               Failed            Closed Failed
//! ```
//!
//! Within one connect attempt the state only moves forward.  A new `connect`
//! restarts at `Opening` from any terminal state.  There is no implicit
//! reconnect.
//!
//! # Threading
//!
//! All fields live in one monitor (`Mutex` + `Condvar`).  The transport never
//! touches the monitor itself: it posts [`TransportEvent`]s on a channel and a
//! single dispatcher thread owned by the `ConnectionState` applies them.
//! Callbacks are cloned out of the monitor and invoked on the dispatcher
//! thread *after* the lock is released, so a callback may call `connected`,
//! `send`, or `status`.  A callback must not call `connect`: the dispatcher
//! is the thread that would have to deliver the handshake outcome.

use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc, Condvar, Mutex, MutexGuard, PoisonError,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::infrastructure::transport::{Dispatch, Transport, TransportEvent, TransportEvents};

/// Callback invoked with every inbound text message.
pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback invoked once each time the connection closes.
pub type ClosedCallback = Arc<dyn Fn() + Send + Sync>;

/// The capability the controller uses to talk to the device side.
///
/// [`ConnectionState`] is the production implementation; tests substitute
/// recording doubles.
pub trait ConnectionProvider: Send + Sync {
    /// Opens the connection, blocking until the handshake resolves.
    /// Returns `true` only when the connection is open.
    fn connect(&self) -> bool;

    /// Returns `true` while the connection is open.  Never blocks.
    fn connected(&self) -> bool;

    /// Sends one text message.  Returns `false` when not connected or when
    /// the transport rejects the message.  Never blocks, retries, or queues.
    fn send(&self, message: &str) -> bool;

    /// Replaces the inbound-message callback.
    fn set_message_callback(&self, callback: MessageCallback);

    /// Replaces the closed callback.
    fn set_closed_callback(&self, callback: ClosedCallback);
}

/// Lifecycle state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// A handshake is in progress (also the state before the first `connect`).
    Opening,
    /// The handshake completed; messages can be sent.
    Opened,
    /// The handshake or the connection failed.
    Failed,
    /// The connection closed.
    Closed,
}

/// Tunables for [`ConnectionState`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    /// Upper bound on how long `connect` waits for the handshake.
    ///
    /// `None` waits forever.  When the bound is hit the attempt is abandoned:
    /// the state becomes `Failed`, the transport is asked to close, and any
    /// late notification from that attempt is ignored.
    pub connect_timeout: Option<Duration>,
}

// ── Monitor ───────────────────────────────────────────────────────────────────

struct Monitor<T> {
    status: ConnectionStatus,
    /// Number of the current connect attempt; notifications for any other
    /// attempt are stale.
    attempt: u64,
    /// `true` while some caller is blocked on the current handshake.
    handshaking: bool,
    transport: T,
    on_message: Option<MessageCallback>,
    on_closed: Option<ClosedCallback>,
}

struct Shared<T> {
    monitor: Mutex<Monitor<T>>,
    changed: Condvar,
}

impl<T: Transport> Shared<T> {
    /// Locks the monitor.  A panic in a previous holder does not leave the
    /// state half-written (every update is a plain field store), so poison
    /// is ignored.
    fn lock(&self) -> MutexGuard<'_, Monitor<T>> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one transport notification and runs the resulting callback
    /// outside the lock.
    fn apply(&self, attempt: u64, event: TransportEvent) {
        let mut callback: Option<Box<dyn FnOnce() + Send>> = None;
        {
            let mut m = self.lock();
            if attempt != m.attempt {
                debug!(attempt, current = m.attempt, "ignoring stale transport event: {event:?}");
                return;
            }

            match event {
                TransportEvent::Opened => {
                    if m.status == ConnectionStatus::Opening {
                        info!(attempt, "connection opened");
                        m.status = ConnectionStatus::Opened;
                    }
                    m.handshaking = false;
                }
                TransportEvent::Failed(reason) => {
                    if is_live(m.status) {
                        warn!(attempt, "connection failed: {reason}");
                        m.status = ConnectionStatus::Failed;
                    }
                    m.handshaking = false;
                }
                TransportEvent::Closed { code, reason } => {
                    if is_live(m.status) {
                        info!(attempt, ?code, "connection closed: {reason}");
                        m.status = ConnectionStatus::Closed;
                        if let Some(cb) = m.on_closed.clone() {
                            callback = Some(Box::new(move || cb()));
                        }
                    }
                    m.handshaking = false;
                }
                TransportEvent::Message(text) => match m.on_message.clone() {
                    Some(cb) => callback = Some(Box::new(move || cb(text))),
                    None => debug!("no message callback registered; dropping {} bytes", text.len()),
                },
            }
            self.changed.notify_all();
        }

        if let Some(callback) = callback {
            callback();
        }
    }
}

/// `Opening` and `Opened` can still move; `Failed` and `Closed` are terminal
/// for the attempt.
fn is_live(status: ConnectionStatus) -> bool {
    matches!(status, ConnectionStatus::Opening | ConnectionStatus::Opened)
}

fn run_dispatcher<T: Transport>(shared: Arc<Shared<T>>, rx: Receiver<Dispatch>) {
    while let Ok(dispatch) = rx.recv() {
        match dispatch {
            Dispatch::Event { attempt, event } => shared.apply(attempt, event),
            Dispatch::Shutdown => break,
        }
    }
    debug!("connection event dispatcher stopped");
}

// ── ConnectionState ───────────────────────────────────────────────────────────

/// Thread-safe connection lifecycle state machine over a [`Transport`].
///
/// # Example
///
/// ```rust
/// use padlink_controller::application::connection_state::{
///     ConnectionConfig, ConnectionProvider, ConnectionState,
/// };
/// use padlink_controller::infrastructure::transport::mock::ScriptedTransport;
///
/// let transport = ScriptedTransport::new();
/// let connection = ConnectionState::new(transport.clone(), ConnectionConfig::default());
/// assert!(connection.connect());
/// assert!(connection.send("press lmb"));
/// assert_eq!(transport.sent(), vec!["press lmb".to_string()]);
/// ```
pub struct ConnectionState<T: Transport> {
    shared: Arc<Shared<T>>,
    config: ConnectionConfig,
    notify_tx: Sender<Dispatch>,
    dispatcher: Option<JoinHandle<()>>,
}

impl<T: Transport> ConnectionState<T> {
    /// Wraps `transport` and starts the notification dispatcher thread.
    /// No handshake is started until [`connect`](Self::connect).
    pub fn new(transport: T, config: ConnectionConfig) -> Self {
        let shared = Arc::new(Shared {
            monitor: Mutex::new(Monitor {
                status: ConnectionStatus::Opening,
                attempt: 0,
                handshaking: false,
                transport,
                on_message: None,
                on_closed: None,
            }),
            changed: Condvar::new(),
        });

        let (notify_tx, notify_rx) = mpsc::channel();
        let dispatcher_shared = Arc::clone(&shared);
        // If the OS refuses a new thread the connection can never learn a
        // handshake outcome; `connect` then fails by timeout or blocks like a
        // hung handshake would.
        let dispatcher = thread::Builder::new()
            .name("padlink-connection-events".to_string())
            .spawn(move || run_dispatcher(dispatcher_shared, notify_rx))
            .map_err(|e| warn!("failed to spawn connection event dispatcher: {e}"))
            .ok();

        Self {
            shared,
            config,
            notify_tx,
            dispatcher,
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.lock().status
    }

    /// Asks the transport to close the current connection.  The state moves
    /// to `Closed` when the transport reports the closure.
    pub fn close(&self) {
        let mut m = self.shared.lock();
        // Attempt 0 means no handshake was ever started.
        if m.attempt > 0 && is_live(m.status) {
            info!(attempt = m.attempt, "closing connection");
            m.transport.close();
        }
    }

    /// Blocks until the handshake of `attempt` resolves or the deadline
    /// passes.  Returns the guard and whether the deadline was hit.
    fn wait_for_handshake<'a>(
        &'a self,
        guard: MutexGuard<'a, Monitor<T>>,
        attempt: u64,
        deadline: Option<Instant>,
    ) -> (MutexGuard<'a, Monitor<T>>, bool) {
        let pending = |m: &mut Monitor<T>| m.handshaking && m.attempt == attempt;
        match deadline {
            None => {
                let guard = self
                    .shared
                    .changed
                    .wait_while(guard, pending)
                    .unwrap_or_else(PoisonError::into_inner);
                (guard, false)
            }
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let (guard, result) = self
                    .shared
                    .changed
                    .wait_timeout_while(guard, remaining, pending)
                    .unwrap_or_else(PoisonError::into_inner);
                (guard, result.timed_out())
            }
        }
    }
}

impl<T: Transport> ConnectionProvider for ConnectionState<T> {
    fn connect(&self) -> bool {
        let deadline = self.config.connect_timeout.map(|t| Instant::now() + t);
        let mut m = self.shared.lock();

        if m.status == ConnectionStatus::Opened {
            return true;
        }

        // Another caller already started a handshake: share its outcome.
        if m.handshaking {
            let attempt = m.attempt;
            debug!(attempt, "handshake already in flight; waiting for its outcome");
            let (m, _) = self.wait_for_handshake(m, attempt, deadline);
            return m.status == ConnectionStatus::Opened;
        }

        m.attempt += 1;
        let attempt = m.attempt;
        m.status = ConnectionStatus::Opening;
        m.handshaking = true;
        info!(attempt, "opening connection");

        let events = TransportEvents::new(attempt, self.notify_tx.clone());
        if let Err(e) = m.transport.open(events) {
            warn!(attempt, "could not start handshake: {e}");
            m.status = ConnectionStatus::Failed;
            m.handshaking = false;
            self.shared.changed.notify_all();
            return false;
        }

        let (mut m, timed_out) = self.wait_for_handshake(m, attempt, deadline);
        if timed_out && m.attempt == attempt && m.handshaking {
            warn!(attempt, timeout = ?self.config.connect_timeout, "handshake timed out; abandoning attempt");
            // Retire the attempt number so late notifications are ignored.
            m.attempt += 1;
            m.status = ConnectionStatus::Failed;
            m.handshaking = false;
            m.transport.close();
            self.shared.changed.notify_all();
            return false;
        }

        m.status == ConnectionStatus::Opened
    }

    fn connected(&self) -> bool {
        self.shared.lock().status == ConnectionStatus::Opened
    }

    fn send(&self, message: &str) -> bool {
        let mut m = self.shared.lock();
        if m.status != ConnectionStatus::Opened {
            return false;
        }

        match m.transport.send(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(attempt = m.attempt, "send failed; marking connection failed: {e}");
                m.status = ConnectionStatus::Failed;
                self.shared.changed.notify_all();
                false
            }
        }
    }

    fn set_message_callback(&self, callback: MessageCallback) {
        self.shared.lock().on_message = Some(callback);
    }

    fn set_closed_callback(&self, callback: ClosedCallback) {
        self.shared.lock().on_closed = Some(callback);
    }
}

impl<T: Transport> Drop for ConnectionState<T> {
    fn drop(&mut self) {
        self.close();
        let _ = self.notify_tx.send(Dispatch::Shutdown);
        if let Some(handle) = self.dispatcher.take() {
            // The last owner may be a callback running on the dispatcher
            // itself; joining there would deadlock.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::{MockTransport, TransportError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Polls `condition` for up to one second.
    fn eventually(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    /// A mock whose handshakes report `Opened` synchronously and which keeps
    /// the latest event handle for later injection.
    fn opening_mock(handle: Arc<StdMutex<Option<TransportEvents>>>) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_open().returning(move |events| {
            events.opened();
            *handle.lock().unwrap() = Some(events);
            Ok(())
        });
        mock.expect_close().returning(|| ());
        mock
    }

    #[test]
    fn test_initial_state_is_opening_and_not_connected() {
        // Arrange
        let connection = ConnectionState::new(MockTransport::new(), ConnectionConfig::default());

        // Assert
        assert_eq!(connection.status(), ConnectionStatus::Opening);
        assert!(!connection.connected());
    }

    #[test]
    fn test_connect_returns_true_when_opened_before_open_returns() {
        // Arrange
        let handle = Arc::new(StdMutex::new(None));
        let connection = ConnectionState::new(opening_mock(handle), ConnectionConfig::default());

        // Act / Assert
        assert!(connection.connect());
        assert!(connection.connected());
    }

    #[test]
    fn test_connect_waits_for_opened_from_another_thread() {
        // Arrange: the handshake resolves 5 ms after `open` returns
        let mut mock = MockTransport::new();
        mock.expect_open().returning(|events| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5));
                events.opened();
            });
            Ok(())
        });
        mock.expect_close().returning(|| ());
        let connection = ConnectionState::new(mock, ConnectionConfig::default());

        // Act / Assert
        assert!(connection.connect());
        assert!(connection.connected());
    }

    #[test]
    fn test_connect_when_opened_does_not_start_a_new_handshake() {
        // Arrange: `open` may be called exactly once
        let mut mock = MockTransport::new();
        mock.expect_open().times(1).returning(|events| {
            events.opened();
            Ok(())
        });
        mock.expect_close().returning(|| ());
        let connection = ConnectionState::new(mock, ConnectionConfig::default());

        // Act
        assert!(connection.connect());
        let second = connection.connect();

        // Assert – mockall verifies `times(1)` on drop
        assert!(second);
    }

    #[test]
    fn test_failed_handshake_returns_false_and_can_retry() {
        // Arrange: first handshake fails, second opens
        let mut mock = MockTransport::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|events| {
                events.failed("refused");
                Ok(())
            });
        mock.expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|events| {
                events.opened();
                Ok(())
            });
        mock.expect_close().returning(|| ());
        let connection = ConnectionState::new(mock, ConnectionConfig::default());

        // Act / Assert
        assert!(!connection.connect());
        assert_eq!(connection.status(), ConnectionStatus::Failed);
        assert!(connection.connect());
        assert!(connection.connected());
    }

    #[test]
    fn test_open_error_marks_failed_without_waiting() {
        let mut mock = MockTransport::new();
        mock.expect_open()
            .returning(|_| Err(TransportError::Handshake("bad url".to_string())));
        let connection = ConnectionState::new(mock, ConnectionConfig::default());

        assert!(!connection.connect());
        assert_eq!(connection.status(), ConnectionStatus::Failed);
    }

    #[test]
    fn test_send_when_not_opened_never_touches_transport() {
        // Arrange: `send` must never be called on the mock
        let mut mock = MockTransport::new();
        mock.expect_send().never();
        let connection = ConnectionState::new(mock, ConnectionConfig::default());

        // Act / Assert
        assert!(!connection.send("press lmb"));
    }

    #[test]
    fn test_send_failure_marks_connection_failed() {
        // Arrange
        let handle = Arc::new(StdMutex::new(None));
        let mut mock = opening_mock(handle);
        mock.expect_send()
            .times(1)
            .returning(|_| Err(TransportError::ChannelClosed));
        let connection = ConnectionState::new(mock, ConnectionConfig::default());
        assert!(connection.connect());

        // Act
        let first = connection.send("msg");
        let second = connection.send("msg");

        // Assert – the second send is refused before reaching the transport
        assert!(!first);
        assert!(!second);
        assert!(!connection.connected());
        assert_eq!(connection.status(), ConnectionStatus::Failed);
    }

    #[test]
    fn test_closed_event_invokes_callback_once_and_disconnects() {
        // Arrange
        let handle = Arc::new(StdMutex::new(None));
        let connection =
            ConnectionState::new(opening_mock(Arc::clone(&handle)), ConnectionConfig::default());
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        connection.set_closed_callback(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(connection.connect());
        let events = handle.lock().unwrap().clone().unwrap();

        // Act: the transport reports the closure twice (close frame + EOF)
        events.closed(Some(1000), "bye");
        events.closed(None, "eof");

        // Assert
        assert!(eventually(|| connection.status() == ConnectionStatus::Closed));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!connection.connected());
    }

    #[test]
    fn test_message_without_callback_is_dropped_then_delivered_once_registered() {
        // Arrange
        let handle = Arc::new(StdMutex::new(None));
        let connection =
            ConnectionState::new(opening_mock(Arc::clone(&handle)), ConnectionConfig::default());
        assert!(connection.connect());
        let events = handle.lock().unwrap().clone().unwrap();
        let received = Arc::new(StdMutex::new(Vec::new()));

        // Act
        events.message("test_1");
        thread::sleep(Duration::from_millis(20));
        let sink = Arc::clone(&received);
        connection.set_message_callback(Arc::new(move |text| sink.lock().unwrap().push(text)));
        events.message("test_2");

        // Assert – the first message was never buffered
        assert!(eventually(|| received.lock().unwrap().len() == 1));
        assert_eq!(*received.lock().unwrap(), vec!["test_2".to_string()]);
    }

    #[test]
    fn test_connect_times_out_and_ignores_late_opened() {
        // Arrange: a hung handshake whose `opened` arrives after the timeout
        let handle: Arc<StdMutex<Option<TransportEvents>>> = Arc::new(StdMutex::new(None));
        let stash = Arc::clone(&handle);
        let mut mock = MockTransport::new();
        mock.expect_open().times(1).returning(move |events| {
            *stash.lock().unwrap() = Some(events);
            Ok(())
        });
        mock.expect_close().times(1).returning(|| ());
        let connection = ConnectionState::new(
            mock,
            ConnectionConfig {
                connect_timeout: Some(Duration::from_millis(20)),
            },
        );

        // Act
        let connected = connection.connect();
        let late = handle.lock().unwrap().clone().unwrap();
        late.opened();
        thread::sleep(Duration::from_millis(20));

        // Assert
        assert!(!connected);
        assert_eq!(connection.status(), ConnectionStatus::Failed);
        assert!(!connection.connected());
    }
}
