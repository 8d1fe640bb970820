//! Text codec for padlink wire messages.
//!
//! Wire format: one transport-level text message per flush, containing the
//! drained events' token groups joined by single spaces, in enqueue order.
//!
//! ```text
//! mouse_mv 4.0 6.0 press lmb mouse_mv 0.0 1.0 mouse_end
//! ```
//!
//! There is no length prefix and no terminator; the transport's own message
//! boundaries delimit a batch.

use thiserror::Error;

use crate::protocol::event::{
    InputEvent, END_COMMAND, MOVE_COMMAND, PRESS_COMMAND, RELEASE_COMMAND, SETTINGS_PRESSED,
};

/// Leading word of the settings status phrase.
const SETTINGS_KEYWORD: &str = "settings";

/// Errors that can occur while decoding a wire message.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The token is not a known command keyword.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// A command ended before all of its operands were read.
    #[error("command {command} is missing its {operand} operand")]
    MissingOperand {
        command: &'static str,
        operand: &'static str,
    },

    /// A movement component could not be parsed as a number.
    #[error("invalid movement delta {0:?}")]
    InvalidDelta(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Serializes a drained batch into one wire message.
///
/// Returns an empty string for an empty batch.
///
/// # Examples
///
/// ```rust
/// use padlink_core::{encode_batch, InputEvent};
///
/// let batch = vec![InputEvent::press("lmb"), InputEvent::movement(1.0, 1.0)];
/// assert_eq!(encode_batch(&batch), "press lmb mouse_mv 1.0 1.0");
/// ```
pub fn encode_batch(events: &[InputEvent]) -> String {
    let mut out = String::with_capacity(events.len() * 16);
    for (i, event) in events.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&event.to_wire());
    }
    out
}

/// Parses one wire message back into the events it carries.
///
/// Any run of ASCII whitespace separates tokens.  The only status signal the
/// device side recognizes is the fixed phrase `settings is pressed`, which is
/// read as three tokens so that commands after it in the same batch survive.
///
/// # Errors
///
/// Returns [`ProtocolError`] on an unknown keyword, a truncated command or
/// status phrase, or a non-numeric movement delta.
///
/// # Examples
///
/// ```rust
/// use padlink_core::{decode_message, InputEvent};
///
/// let events = decode_message("mouse_mv 4.0 6.0 mouse_end").unwrap();
/// assert_eq!(events, vec![InputEvent::movement(4.0, 6.0), InputEvent::End]);
/// ```
pub fn decode_message(text: &str) -> Result<Vec<InputEvent>, ProtocolError> {
    let mut tokens = text.split_whitespace();
    let mut events = Vec::new();

    while let Some(token) = tokens.next() {
        let event = match token {
            MOVE_COMMAND => {
                let dx = parse_delta(tokens.next(), "dx")?;
                let dy = parse_delta(tokens.next(), "dy")?;
                InputEvent::Move { dx, dy }
            }
            END_COMMAND => InputEvent::End,
            PRESS_COMMAND => InputEvent::press(expect_name(tokens.next(), PRESS_COMMAND)?),
            RELEASE_COMMAND => InputEvent::release(expect_name(tokens.next(), RELEASE_COMMAND)?),
            SETTINGS_KEYWORD => {
                expect_phrase(&mut tokens)?;
                InputEvent::Status(SETTINGS_PRESSED.to_string())
            }
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        events.push(event);
    }

    Ok(events)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn parse_delta(token: Option<&str>, operand: &'static str) -> Result<f32, ProtocolError> {
    let token = token.ok_or(ProtocolError::MissingOperand {
        command: MOVE_COMMAND,
        operand,
    })?;
    match token.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ProtocolError::InvalidDelta(token.to_string())),
    }
}

/// Consumes the words of [`SETTINGS_PRESSED`] that follow its keyword.
fn expect_phrase<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<(), ProtocolError> {
    for expected in SETTINGS_PRESSED.split_whitespace().skip(1) {
        match tokens.next() {
            Some(token) if token == expected => {}
            Some(token) => {
                return Err(ProtocolError::UnknownCommand(format!(
                    "{SETTINGS_KEYWORD} {token}"
                )))
            }
            None => {
                return Err(ProtocolError::MissingOperand {
                    command: SETTINGS_KEYWORD,
                    operand: "status phrase",
                })
            }
        }
    }
    Ok(())
}

fn expect_name(token: Option<&str>, command: &'static str) -> Result<String, ProtocolError> {
    token
        .map(str::to_string)
        .ok_or(ProtocolError::MissingOperand {
            command,
            operand: "name",
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
