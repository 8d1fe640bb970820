//! Application layer use cases for the controller.
//!
//! # Sub-modules
//!
//! - **`connection_state`** – The connection lifecycle state machine.  Wraps
//!   a [`crate::infrastructure::transport::Transport`] and exposes the
//!   blocking/non-blocking [`connection_state::ConnectionProvider`] contract.
//!
//! - **`event_sender`** – The producer/consumer batching pipeline.  Runs on
//!   every movement sample, so enqueueing never touches the network.
//!
//! - **`feed_input`** – Parses producer command lines (`move 3 -2`,
//!   `press lmb`, ...) and forwards them to an event sender.  Stands in for
//!   the touch UI, which lives outside this crate.
//!
//! Use cases depend on traits (`Transport`, `ConnectionProvider`) so tests
//! can inject scripted doubles.

pub mod connection_state;
pub mod event_sender;
pub mod feed_input;
