//! Domain layer: pure batching logic with no I/O and no threads.
//!
//! The [`queue::EventQueue`] is the only stateful piece here.  Callers that
//! share it between threads (the controller's event sender) wrap it in their
//! own lock; the queue itself stays single-threaded and easy to test.

pub mod queue;

pub use queue::EventQueue;
