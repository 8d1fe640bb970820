//! FeedInputUseCase: turns producer command lines into enqueued events.
//!
//! The controller binary has no touch surface of its own, so it reads one
//! command per line and forwards it to the batching pipeline:
//!
//! | Line              | Effect                         |
//! |-------------------|--------------------------------|
//! | `move <dx> <dy>`  | movement sample                |
//! | `done`            | end of the movement gesture    |
//! | `press <name>`    | button press (`lmb`, `mmb`, …) |
//! | `release <name>`  | button release                 |
//! | `settings`        | settings-button status signal  |
//! | `quit`            | stop feeding                   |
//!
//! Blank lines and lines starting with `#` are ignored.

use thiserror::Error;

use crate::application::event_sender::EventSender;

/// Error type for command parsing.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0:?}")]
    Unknown(String),
    #[error("{command} expects {expected}")]
    Usage {
        command: &'static str,
        expected: &'static str,
    },
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}

/// One parsed producer command.
#[derive(Debug, Clone, PartialEq)]
pub enum ProducerCommand {
    Move { dx: f32, dy: f32 },
    Done,
    Press(String),
    Release(String),
    Settings,
    Quit,
}

/// Whether the caller should keep feeding lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The producer-side operations a command can trigger.
///
/// [`EventSender`] is the production implementation.
pub trait InputSink {
    fn move_by(&self, dx: f32, dy: f32);
    fn move_done(&self);
    fn press(&self, name: &str);
    fn release(&self, name: &str);
    fn settings_pressed(&self);
}

impl InputSink for EventSender {
    fn move_by(&self, dx: f32, dy: f32) {
        EventSender::move_by(self, dx, dy);
    }

    fn move_done(&self) {
        EventSender::move_done(self);
    }

    fn press(&self, name: &str) {
        EventSender::press(self, name);
    }

    fn release(&self, name: &str) {
        EventSender::release(self, name);
    }

    fn settings_pressed(&self) {
        EventSender::settings_pressed(self);
    }
}

/// Parses one command line.  Returns `Ok(None)` for blank and comment lines.
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands, missing or extra operands,
/// and deltas that are not finite numbers.
pub fn parse_command(line: &str) -> Result<Option<ProducerCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let operands: Vec<&str> = parts.collect();

    let command = match (verb, operands.as_slice()) {
        ("move", [dx, dy]) => ProducerCommand::Move {
            dx: parse_number(dx)?,
            dy: parse_number(dy)?,
        },
        ("move", _) => {
            return Err(CommandError::Usage {
                command: "move",
                expected: "<dx> <dy>",
            })
        }
        ("press", [name]) => ProducerCommand::Press(name.to_string()),
        ("release", [name]) => ProducerCommand::Release(name.to_string()),
        ("press", _) | ("release", _) => {
            return Err(CommandError::Usage {
                command: if verb == "press" { "press" } else { "release" },
                expected: "one button name",
            })
        }
        ("done", []) => ProducerCommand::Done,
        ("settings", []) => ProducerCommand::Settings,
        ("quit", []) => ProducerCommand::Quit,
        _ => return Err(CommandError::Unknown(line.to_string())),
    };
    Ok(Some(command))
}

fn parse_number(token: &str) -> Result<f32, CommandError> {
    token
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(token.to_string()))
}

/// Applies one parsed command to `sink`.
pub fn apply<S: InputSink + ?Sized>(sink: &S, command: ProducerCommand) -> Flow {
    match command {
        ProducerCommand::Move { dx, dy } => sink.move_by(dx, dy),
        ProducerCommand::Done => sink.move_done(),
        ProducerCommand::Press(name) => sink.press(&name),
        ProducerCommand::Release(name) => sink.release(&name),
        ProducerCommand::Settings => sink.settings_pressed(),
        ProducerCommand::Quit => return Flow::Quit,
    }
    Flow::Continue
}

/// Parses `line` and applies it to `sink`.
///
/// # Errors
///
/// Propagates [`parse_command`] errors; nothing is enqueued in that case.
pub fn feed_line<S: InputSink + ?Sized>(sink: &S, line: &str) -> Result<Flow, CommandError> {
    Ok(match parse_command(line)? {
        Some(command) => apply(sink, command),
        None => Flow::Continue,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call as a readable string.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl InputSink for RecordingSink {
        fn move_by(&self, dx: f32, dy: f32) {
            self.record(format!("move {dx} {dy}"));
        }
        fn move_done(&self) {
            self.record("done".to_string());
        }
        fn press(&self, name: &str) {
            self.record(format!("press {name}"));
        }
        fn release(&self, name: &str) {
            self.record(format!("release {name}"));
        }
        fn settings_pressed(&self) {
            self.record("settings".to_string());
        }
    }

    #[test]
    fn test_parse_move_with_fractional_and_negative_deltas() {
        let command = parse_command("move 1.5 -2").unwrap();
        assert_eq!(command, Some(ProducerCommand::Move { dx: 1.5, dy: -2.0 }));
    }

    #[test]
    fn test_parse_button_commands() {
        assert_eq!(
            parse_command("press lmb").unwrap(),
            Some(ProducerCommand::Press("lmb".to_string()))
        );
        assert_eq!(
            parse_command("  release rmb  ").unwrap(),
            Some(ProducerCommand::Release("rmb".to_string()))
        );
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("# drag test").unwrap(), None);
    }

    #[test]
    fn test_move_with_missing_operand_is_a_usage_error() {
        let err = parse_command("move 3").unwrap_err();
        assert_eq!(
            err,
            CommandError::Usage {
                command: "move",
                expected: "<dx> <dy>"
            }
        );
    }

    #[test]
    fn test_non_finite_delta_is_rejected() {
        assert_eq!(
            parse_command("move NaN 1").unwrap_err(),
            CommandError::InvalidNumber("NaN".to_string())
        );
        assert_eq!(
            parse_command("move 1 inf").unwrap_err(),
            CommandError::InvalidNumber("inf".to_string())
        );
    }

    #[test]
    fn test_unknown_command_is_reported_verbatim() {
        let err = parse_command("jump 3").unwrap_err();
        assert_eq!(err, CommandError::Unknown("jump 3".to_string()));
    }

    #[test]
    fn test_release_without_name_names_the_command() {
        let err = parse_command("release").unwrap_err();
        assert_eq!(err.to_string(), "release expects one button name");
    }

    #[test]
    fn test_feed_line_forwards_a_drag_gesture_in_order() {
        // Arrange
        let sink = RecordingSink::default();
        let script = ["press lmb", "move 1 2", "move 0.5 0.5", "release lmb", "done"];

        // Act
        for line in script {
            assert_eq!(feed_line(&sink, line).unwrap(), Flow::Continue);
        }

        // Assert
        assert_eq!(
            sink.calls(),
            vec!["press lmb", "move 1 2", "move 0.5 0.5", "release lmb", "done"]
        );
    }

    #[test]
    fn test_quit_stops_feeding_without_touching_the_sink() {
        let sink = RecordingSink::default();

        assert_eq!(feed_line(&sink, "quit").unwrap(), Flow::Quit);
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn test_invalid_line_enqueues_nothing() {
        let sink = RecordingSink::default();

        assert!(feed_line(&sink, "press").is_err());
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn test_settings_command_forwards_settings_signal() {
        let sink = RecordingSink::default();

        feed_line(&sink, "settings").unwrap();

        assert_eq!(sink.calls(), vec!["settings"]);
    }
}
