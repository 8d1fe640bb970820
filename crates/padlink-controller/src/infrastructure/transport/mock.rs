//! Scripted transport for unit and integration testing.
//!
//! Lets tests decide how the next handshake ends, record every outbound
//! message, and inject inbound traffic or closure without a real socket.
//! All state lives behind `Arc`s so a test can keep a clone of the transport
//! after moving the original into a `ConnectionState`.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::thread;
use std::time::Duration;

use super::{Transport, TransportError, TransportEvents};

/// How the next call to [`Transport::open`] resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeScript {
    /// Report `Opened` synchronously, before `open` returns.
    Open,
    /// Report `Opened` from another thread after the delay.
    OpenAfter(Duration),
    /// Report `Failed` synchronously.
    Fail(String),
    /// Report `Opened` and then `Closed` synchronously.
    OpenThenClose,
    /// Never report anything (a hung handshake).
    Silent,
    /// Refuse to start the handshake at all.
    Refuse,
}

/// A [`Transport`] whose behaviour is scripted by the test.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<HandshakeScript>>,
    sent: Arc<Mutex<Vec<String>>>,
    fail_sends: Arc<AtomicBool>,
    open_calls: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
    events: Arc<Mutex<Option<TransportEvents>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("lock poisoned")
}

impl ScriptedTransport {
    /// Creates a transport whose handshakes succeed immediately.
    pub fn new() -> Self {
        Self::with_script(HandshakeScript::Open)
    }

    /// Creates a transport with the given handshake script.
    pub fn with_script(script: HandshakeScript) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_sends: Arc::new(AtomicBool::new(false)),
            open_calls: Arc::new(AtomicUsize::new(0)),
            close_calls: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(Mutex::new(None)),
        }
    }

    /// Replaces the script used by subsequent handshakes.
    pub fn set_script(&self, script: HandshakeScript) {
        *lock(&self.script) = script;
    }

    /// Makes every subsequent `send` fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Messages accepted by `send`, in order.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    /// Number of handshakes started.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Injects an inbound message on the most recent attempt.
    ///
    /// Panics if no handshake has been started yet.
    pub fn inject_message(&self, text: &str) {
        self.current_events().message(text);
    }

    /// Injects a peer-initiated closure on the most recent attempt.
    pub fn inject_closed(&self) {
        self.current_events().closed(Some(1000), "closed by peer");
    }

    /// Injects a connection failure on the most recent attempt.
    pub fn inject_failure(&self, reason: &str) {
        self.current_events().failed(reason);
    }

    /// Injects `Opened` on the most recent attempt (for `Silent` scripts).
    pub fn inject_opened(&self) {
        self.current_events().opened();
    }

    /// The notification handle of the most recent attempt.
    pub fn current_events(&self) -> TransportEvents {
        lock(&self.events)
            .clone()
            .expect("ScriptedTransport: no handshake has been started")
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, events: TransportEvents) -> Result<(), TransportError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.events) = Some(events.clone());

        let script = lock(&self.script).clone();
        match script {
            HandshakeScript::Open => {
                events.opened();
            }
            HandshakeScript::OpenAfter(delay) => {
                thread::spawn(move || {
                    thread::sleep(delay);
                    events.opened();
                });
            }
            HandshakeScript::Fail(reason) => {
                events.failed(reason);
            }
            HandshakeScript::OpenThenClose => {
                events.opened();
                events.closed(Some(1000), "closed during handshake");
            }
            HandshakeScript::Silent => {}
            HandshakeScript::Refuse => {
                return Err(TransportError::Handshake("scripted refusal".to_string()));
            }
        }
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("scripted send failure".to_string()));
        }
        lock(&self.sent).push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(events) = lock(&self.events).as_ref() {
            events.closed(Some(1000), "closed by controller");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::{Dispatch, TransportEvent};
    use std::sync::mpsc;

    fn next_event(rx: &mpsc::Receiver<Dispatch>) -> TransportEvent {
        match rx.recv_timeout(Duration::from_secs(1)).unwrap() {
            Dispatch::Event { event, .. } => event,
            Dispatch::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[test]
    fn test_open_script_reports_opened_synchronously() {
        // Arrange
        let (tx, rx) = mpsc::channel();
        let mut transport = ScriptedTransport::new();

        // Act
        transport.open(TransportEvents::new(1, tx)).unwrap();

        // Assert
        assert_eq!(next_event(&rx), TransportEvent::Opened);
        assert_eq!(transport.open_calls(), 1);
    }

    #[test]
    fn test_open_after_reports_from_another_thread() {
        let (tx, rx) = mpsc::channel();
        let mut transport = ScriptedTransport::with_script(HandshakeScript::OpenAfter(
            Duration::from_millis(5),
        ));

        transport.open(TransportEvents::new(1, tx)).unwrap();

        assert_eq!(next_event(&rx), TransportEvent::Opened);
    }

    #[test]
    fn test_refuse_script_returns_error_without_events() {
        let (tx, rx) = mpsc::channel();
        let mut transport = ScriptedTransport::with_script(HandshakeScript::Refuse);

        let result = transport.open(TransportEvents::new(1, tx));

        assert!(matches!(result, Err(TransportError::Handshake(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_records_messages_until_failures_are_scripted() {
        // Arrange
        let mut transport = ScriptedTransport::new();

        // Act
        transport.send("press lmb").unwrap();
        transport.set_fail_sends(true);
        let failed = transport.send("release lmb");

        // Assert
        assert!(failed.is_err());
        assert_eq!(transport.sent(), vec!["press lmb".to_string()]);
    }

    #[test]
    fn test_close_posts_closed_on_current_attempt() {
        let (tx, rx) = mpsc::channel();
        let mut transport = ScriptedTransport::with_script(HandshakeScript::Silent);
        transport.open(TransportEvents::new(4, tx)).unwrap();

        transport.close();

        assert!(matches!(next_event(&rx), TransportEvent::Closed { .. }));
        assert_eq!(transport.close_calls(), 1);
    }
}
