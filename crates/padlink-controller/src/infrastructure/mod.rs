//! Infrastructure layer for the controller.
//!
//! Contains I/O-facing adapters: the WebSocket transport (plus a scripted
//! transport for tests) and the TOML configuration file.
//!
//! **Dependency rule**: this layer may depend on `padlink_core`, but the
//! application layer only reaches into it for the `Transport` seam.

pub mod storage;
pub mod transport;
