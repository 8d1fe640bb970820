//! Storage infrastructure: configuration file persistence.
//!
//! # Sub-modules
//!
//! - **`config`** – Loads and saves [`config::ControllerConfig`] as TOML.

pub mod config;

pub use config::{ConfigError, ControllerConfig};
