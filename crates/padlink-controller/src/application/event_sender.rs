//! EventSender: the producer/consumer batching pipeline.
//!
//! The producer (the UI or input thread) calls [`EventSender::move_by`],
//! [`EventSender::press`] and friends.  Each call only locks the queue long
//! enough to push one event, so the producer never waits on the network.
//!
//! A dedicated consumer thread owned by the sender runs this loop:
//!
//! ```text
//! wait until queue non-empty or stop requested
//!   └─ stop requested and queue empty → exit
//! sleep the batching window            (lets same-tick samples coalesce)
//! drain the queue                      (swap-and-clear, closes the movement run)
//! encode the batch                     (one space-joined wire message)
//! ConnectionProvider::send             (failure drops the batch)
//! ```
//!
//! Because there is exactly one consumer, batch N is sent before batch N+1
//! is drained, and tokens inside a batch keep producer order.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use padlink_core::protocol::event::SETTINGS_PRESSED;
use padlink_core::{encode_batch, EventQueue, InputEvent};
use tracing::{debug, info, warn};

use crate::application::connection_state::ConnectionProvider;

/// Default batching window: long enough for a burst of touch samples from one
/// frame to coalesce, short enough to be imperceptible.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(2);

/// Tunables for [`EventSender`].
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Delay between noticing queued events and draining them.
    pub batch_window: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            batch_window: DEFAULT_BATCH_WINDOW,
        }
    }
}

/// State shared by the producer and the consumer thread.
#[derive(Default)]
struct Pipeline {
    queue: EventQueue,
    stopping: bool,
}

struct Shared {
    pipeline: Mutex<Pipeline>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pipeline> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Coalescing, batching event sender bound to one [`ConnectionProvider`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use padlink_controller::application::connection_state::{
///     ConnectionConfig, ConnectionProvider, ConnectionState,
/// };
/// use padlink_controller::application::event_sender::{EventSender, SenderConfig};
/// use padlink_controller::infrastructure::transport::mock::ScriptedTransport;
///
/// let transport = ScriptedTransport::new();
/// let connection = Arc::new(ConnectionState::new(transport.clone(), ConnectionConfig::default()));
/// assert!(connection.connect());
///
/// let mut sender = EventSender::new(connection, SenderConfig::default());
/// sender.press("lmb");
/// sender.move_by(1.0, 1.0);
/// sender.stop();
///
/// // The two events may land in one batch or two; order is kept either way.
/// assert_eq!(transport.sent().join(" "), "press lmb mouse_mv 1.0 1.0");
/// ```
pub struct EventSender {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    /// Set only when the consumer thread could not be started; every
    /// enqueue is then flushed on the caller's thread.
    inline: Option<BatchSink>,
}

/// Sends one encoded batch; `false` means the batch was not delivered.
type BatchSink = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Starts the consumer body on a new thread.
type Spawner = dyn FnOnce(Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>;

impl EventSender {
    /// Starts the consumer thread.  Batches go to `provider`.
    ///
    /// If the OS refuses the thread, the sender degrades to flushing each
    /// event synchronously inside the producer call.
    pub fn new<P>(provider: Arc<P>, config: SenderConfig) -> Self
    where
        P: ConnectionProvider + ?Sized + 'static,
    {
        Self::start(
            provider,
            config,
            Box::new(|body: Box<dyn FnOnce() + Send>| {
                thread::Builder::new()
                    .name("padlink-event-sender".to_string())
                    .spawn(body)
            }),
        )
    }

    fn start<P>(provider: Arc<P>, config: SenderConfig, spawn: Box<Spawner>) -> Self
    where
        P: ConnectionProvider + ?Sized + 'static,
    {
        let shared = Arc::new(Shared {
            pipeline: Mutex::new(Pipeline::default()),
            wake: Condvar::new(),
        });
        let sink: BatchSink = Arc::new(move |message: &str| provider.send(message));

        let worker_shared = Arc::clone(&shared);
        let worker_sink = Arc::clone(&sink);
        match spawn(Box::new(move || {
            run_consumer(worker_shared, worker_sink, config.batch_window)
        })) {
            Ok(worker) => Self {
                shared,
                worker: Some(worker),
                inline: None,
            },
            Err(e) => {
                warn!("failed to spawn event sender thread, sending inline: {e}");
                Self {
                    shared,
                    worker: None,
                    inline: Some(sink),
                }
            }
        }
    }

    /// Enqueues a movement sample; merges with an undrained movement run.
    ///
    /// Non-finite samples (NaN, infinity) are discarded: one of them would
    /// poison every sample it is merged with.
    pub fn move_by(&self, dx: f32, dy: f32) {
        if !dx.is_finite() || !dy.is_finite() {
            debug!("discarding non-finite movement sample ({dx}, {dy})");
            return;
        }
        self.enqueue(InputEvent::movement(dx, dy));
    }

    /// Enqueues the end of a movement gesture.
    pub fn move_done(&self) {
        self.enqueue(InputEvent::End);
    }

    /// Enqueues a button press.
    pub fn press(&self, name: &str) {
        self.enqueue(InputEvent::press(name));
    }

    /// Enqueues a button release.
    pub fn release(&self, name: &str) {
        self.enqueue(InputEvent::release(name));
    }

    /// Enqueues a status signal, sent verbatim.  The device side only
    /// understands [`SETTINGS_PRESSED`].
    pub fn status(&self, text: &str) {
        self.enqueue(InputEvent::Status(text.to_string()));
    }

    /// Enqueues the settings-button status signal.
    pub fn settings_pressed(&self) {
        self.status(SETTINGS_PRESSED);
    }

    /// Stops the consumer thread after it has flushed every event enqueued
    /// before this call.  Blocks until the thread exits.  Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.lock().stopping = true;
        self.shared.wake.notify_one();
        if worker.join().is_err() {
            warn!("event sender thread panicked");
        }
    }

    fn enqueue(&self, event: InputEvent) {
        let mut pipeline = self.shared.lock();
        pipeline.queue.push(event);
        match &self.inline {
            // Sent while still holding the lock so concurrent producers
            // cannot reorder batches.
            Some(sink) => send_batch(sink.as_ref(), pipeline.queue.drain()),
            None => {
                drop(pipeline);
                self.shared.wake.notify_one();
            }
        }
    }
}

impl Drop for EventSender {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_consumer(shared: Arc<Shared>, sink: BatchSink, batch_window: Duration) {
    info!(?batch_window, "event sender started");
    loop {
        {
            let pipeline = shared
                .wake
                .wait_while(shared.lock(), |p| p.queue.is_empty() && !p.stopping)
                .unwrap_or_else(PoisonError::into_inner);
            if pipeline.stopping && pipeline.queue.is_empty() {
                break;
            }
        }

        // Batching window, with the lock released so the producer keeps going.
        if !batch_window.is_zero() {
            thread::sleep(batch_window);
        }

        let batch = shared.lock().queue.drain();
        send_batch(sink.as_ref(), batch);
    }
    info!("event sender stopped");
}

/// Encodes and sends one drained batch.  A failed send drops the batch.
fn send_batch(sink: &(dyn Fn(&str) -> bool + Send + Sync), batch: Vec<InputEvent>) {
    if batch.is_empty() {
        return;
    }

    let message = encode_batch(&batch);
    if sink(&message) {
        debug!(events = batch.len(), "sent batch: {message}");
    } else {
        warn!(events = batch.len(), "send failed; dropping batch");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
