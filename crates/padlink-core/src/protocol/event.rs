//! Input event variants and their wire rendering.
//!
//! Every event renders to one space-separated token group:
//!
//! ```text
//! mouse_mv <dx> <dy>      accumulated pointer movement
//! mouse_end               end of a movement gesture
//! press <name>            button went down
//! release <name>          button went up
//! <free-form text>        status signal, e.g. "settings is pressed"
//! ```

use std::fmt;

// ── Command keywords ──────────────────────────────────────────────────────────

/// Keyword for a movement command.
pub const MOVE_COMMAND: &str = "mouse_mv";

/// Keyword for the end-of-gesture command.
pub const END_COMMAND: &str = "mouse_end";

/// Keyword for a button press command.
pub const PRESS_COMMAND: &str = "press";

/// Keyword for a button release command.
pub const RELEASE_COMMAND: &str = "release";

/// Status text sent when the controller's settings button is tapped.
pub const SETTINGS_PRESSED: &str = "settings is pressed";

// ── Event type ────────────────────────────────────────────────────────────────

/// A single interaction event produced by the controller surface.
///
/// Only [`InputEvent::Move`] participates in coalescing (see
/// [`crate::domain::queue::EventQueue`]); every other variant is delivered
/// exactly as enqueued.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Relative pointer movement.  Two queued moves combine by vector addition.
    Move {
        /// Horizontal delta.
        dx: f32,
        /// Vertical delta.
        dy: f32,
    },
    /// A button transition.  `name` is opaque to this crate (`lmb`, `rmb`, ...).
    Button {
        /// Button identifier as understood by the device side.
        name: String,
        /// `true` for press, `false` for release.
        pressed: bool,
    },
    /// End of a movement gesture (finger lifted).
    End,
    /// Free-form status signal that is not pointer input.
    Status(String),
}

impl InputEvent {
    /// Creates a movement event.
    pub fn movement(dx: f32, dy: f32) -> Self {
        Self::Move { dx, dy }
    }

    /// Creates a button-press event.
    pub fn press(name: impl Into<String>) -> Self {
        Self::Button {
            name: name.into(),
            pressed: true,
        }
    }

    /// Creates a button-release event.
    pub fn release(name: impl Into<String>) -> Self {
        Self::Button {
            name: name.into(),
            pressed: false,
        }
    }

    /// Returns `true` for [`InputEvent::Move`].
    pub fn is_movement(&self) -> bool {
        matches!(self, Self::Move { .. })
    }

    /// Adds another movement delta into this event in place.
    ///
    /// Returns `false` (and leaves `self` untouched) when `self` is not a
    /// movement event, or when either summed component would overflow to a
    /// non-finite value.
    pub fn accumulate(&mut self, delta_x: f32, delta_y: f32) -> bool {
        match self {
            Self::Move { dx, dy } => {
                let (sum_x, sum_y) = (*dx + delta_x, *dy + delta_y);
                if !sum_x.is_finite() || !sum_y.is_finite() {
                    return false;
                }
                *dx = sum_x;
                *dy = sum_y;
                true
            }
            _ => false,
        }
    }

    /// Renders this event as its wire token group.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `{:?}` is the shortest round-trip form: "4.0" and "-0.5" for
            // ordinary deltas, exponent form ("1e-7", "1e17") at the extremes.
            // Both parse back to the same f32.
            Self::Move { dx, dy } => write!(f, "{MOVE_COMMAND} {dx:?} {dy:?}"),
            Self::Button {
                name,
                pressed: true,
            } => write!(f, "{PRESS_COMMAND} {name}"),
            Self::Button {
                name,
                pressed: false,
            } => write!(f, "{RELEASE_COMMAND} {name}"),
            Self::End => f.write_str(END_COMMAND),
            Self::Status(text) => f.write_str(text),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
