//! Transport infrastructure: the duplex message connection under the
//! connection state machine.
//!
//! A transport performs its handshake and delivers inbound traffic on its
//! own schedule (in production a tokio runtime; in tests whatever thread the
//! test likes).  Instead of calling back into the state machine directly, it
//! posts [`TransportEvent`]s through the [`TransportEvents`] handle it was
//! given in [`Transport::open`].  The state machine consumes those events on
//! a single dispatcher thread.
//!
//! # Testability
//!
//! The `Transport` trait lets unit tests drive the state machine with a
//! `mockall` mock or with [`mock::ScriptedTransport`] instead of a real socket.

use std::sync::mpsc::Sender;

use thiserror::Error;

pub mod mock;
pub mod websocket;

/// A notification from the transport about the connection it manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake completed; the connection can carry messages.
    Opened,
    /// A text message arrived from the device side.
    Message(String),
    /// The connection closed (by either side).
    Closed {
        /// Close code, when the peer supplied one.
        code: Option<u16>,
        /// Human-readable close reason (may be empty).
        reason: String,
    },
    /// The handshake or an established connection failed.
    Failed(String),
}

/// Item carried on the state machine's notification channel.
#[derive(Debug)]
pub(crate) enum Dispatch {
    /// A transport notification tagged with the connect attempt it belongs to.
    Event { attempt: u64, event: TransportEvent },
    /// Stops the dispatcher thread.
    Shutdown,
}

/// Handle a transport uses to post notifications for one connect attempt.
///
/// Cloneable so a transport can hand copies to its reader and writer tasks.
/// Every notification is tagged with the attempt number it was created for;
/// notifications from an abandoned attempt are ignored by the state machine.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    attempt: u64,
    tx: Sender<Dispatch>,
}

impl TransportEvents {
    pub(crate) fn new(attempt: u64, tx: Sender<Dispatch>) -> Self {
        Self { attempt, tx }
    }

    /// The connect attempt these notifications belong to.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Posts `event`.  Returns `false` when the state machine is gone.
    pub fn post(&self, event: TransportEvent) -> bool {
        self.tx
            .send(Dispatch::Event {
                attempt: self.attempt,
                event,
            })
            .is_ok()
    }

    /// Reports a completed handshake.
    pub fn opened(&self) -> bool {
        self.post(TransportEvent::Opened)
    }

    /// Reports an inbound text message.
    pub fn message(&self, text: impl Into<String>) -> bool {
        self.post(TransportEvent::Message(text.into()))
    }

    /// Reports that the connection closed.
    pub fn closed(&self, code: Option<u16>, reason: impl Into<String>) -> bool {
        self.post(TransportEvent::Closed {
            code,
            reason: reason.into(),
        })
    }

    /// Reports a handshake or connection failure.
    pub fn failed(&self, reason: impl Into<String>) -> bool {
        self.post(TransportEvent::Failed(reason.into()))
    }
}

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `send` was called with no live connection behind the transport.
    #[error("transport is not connected")]
    NotConnected,
    /// The background writer has shut down; nothing more can be sent.
    #[error("transport writer has shut down")]
    ChannelClosed,
    /// The handshake could not even be started (bad URL, no runtime, ...).
    #[error("failed to start handshake: {0}")]
    Handshake(String),
    /// The transport refused the message.
    #[error("send rejected: {0}")]
    Rejected(String),
}

/// Trait abstracting the duplex connection primitive.
///
/// The production implementation is [`websocket::WsTransport`]; tests use
/// [`mock::ScriptedTransport`] or a `mockall` mock.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + 'static {
    /// Starts a handshake without blocking.  The outcome is reported later
    /// (or synchronously, before returning) through `events`.
    fn open(&mut self, events: TransportEvents) -> Result<(), TransportError>;

    /// Queues `text` for delivery without blocking.  Best effort: `Ok` means
    /// the message was accepted, not that the peer received it.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Asks the current connection to close.  A [`TransportEvent::Closed`]
    /// is expected to follow.
    fn close(&mut self);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
