//! Ordered event queue with movement coalescing.
//!
//! Touch surfaces report movement far more often than the wire can usefully
//! carry, so consecutive movement samples are merged at enqueue time:
//!
//! ```text
//! push(move 1,2)   → [move 1,2]
//! push(move 3,4)   → [move 4,6]            merged into the open run
//! push(press lmb)  → [move 4,6, press lmb] run closed
//! push(move 0,1)   → [move 4,6, press lmb, move 0,1]
//! drain()          → returns all three, queue empty, no open run
//! ```
//!
//! Everything except movement is appended verbatim, so producer order is
//! preserved between the last state of a movement run and whatever follows.

use tracing::trace;

use crate::protocol::event::InputEvent;

/// Ordered, coalescing queue of undrained [`InputEvent`]s.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<InputEvent>,
    /// Index of the movement entry that still accepts merges, if any.
    open_run: Option<usize>,
}

impl EventQueue {
    /// Creates an empty queue with no open movement run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `event`, merging it into the open movement run when both are
    /// movements.  A sample whose merge would overflow starts a new entry
    /// (and a new run) instead.
    pub fn push(&mut self, event: InputEvent) {
        if let InputEvent::Move { dx, dy } = event {
            if let Some(entry) = self.open_run.and_then(|i| self.events.get_mut(i)) {
                if entry.accumulate(dx, dy) {
                    trace!("coalesced movement sample ({dx}, {dy})");
                    return;
                }
            }
            self.events.push(event);
            self.open_run = Some(self.events.len() - 1);
        } else {
            self.events.push(event);
            self.open_run = None;
        }
    }

    /// Removes and returns every queued event in enqueue order and closes the
    /// open movement run.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.open_run = None;
        std::mem::take(&mut self.events)
    }

    /// Returns the queued events without draining them.
    pub fn as_slice(&self) -> &[InputEvent] {
        &self.events
    }

    /// Number of queued entries (after coalescing).
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
