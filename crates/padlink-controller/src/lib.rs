//! padlink-controller library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the controller do? (for beginners)
//!
//! The *controller* is the touch surface the user holds.  It never moves a
//! pointer itself: it turns finger movement and button taps into small text
//! commands and sends them over a WebSocket to the *device side*, which
//! replays them as real mouse input.
//!
//! The controller:
//!
//! 1. Opens the connection through [`application::connection_state`], which
//!    turns the transport's asynchronous handshake into a blocking `connect`.
//! 2. Feeds input samples to [`application::event_sender`], which merges
//!    movement bursts and flushes one message per batching window from its
//!    own thread.
//! 3. Reports inbound messages and closure through registered callbacks.

/// Application layer: connection lifecycle and event batching.
pub mod application;

/// Infrastructure layer: transports and configuration storage.
pub mod infrastructure;
