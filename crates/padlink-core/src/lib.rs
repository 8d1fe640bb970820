//! # padlink-core
//!
//! Shared library for padlink containing the input event model, the
//! movement-coalescing event queue, and the text codec used on the wire.
//!
//! This crate is used by the controller application and by anything that
//! needs to understand what the controller sends (tests, device-side tools).
//! It has zero dependencies on OS APIs, UI frameworks, threads, or sockets.
//!
//! # Architecture overview (for beginners)
//!
//! padlink turns a phone-style touch surface into a remote mouse.  The
//! controller side samples finger movement and button taps and sends them to
//! the "device side", which replays them as real pointer input.
//!
//! This crate (`padlink-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – What travels over the connection.  Every message is a
//!   line of ASCII commands such as `mouse_mv 4.0 6.0 press lmb mouse_end`,
//!   produced from typed [`InputEvent`] values and parsed back into them.
//!
//! - **`domain`** – Pure batching logic with no I/O.  The [`EventQueue`]
//!   merges consecutive movement samples so that a burst of touch events
//!   becomes one movement command per flush.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `padlink_core::InputEvent` instead of `padlink_core::protocol::event::InputEvent`.
pub use domain::queue::EventQueue;
pub use protocol::codec::{decode_message, encode_batch, ProtocolError};
pub use protocol::event::InputEvent;
