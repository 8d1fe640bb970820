//! Integration tests for the padlink-core wire format.
//!
//! These tests drive the public API the way the controller does: push
//! samples into an [`EventQueue`], drain, encode the batch, and check that
//! the device side would read back the same (coalesced) events.

use padlink_core::{
    decode_message, encode_batch,
    protocol::event::SETTINGS_PRESSED,
    EventQueue, InputEvent,
};

/// Pushes `events` through a fresh queue and returns the encoded batch.
fn flush(events: Vec<InputEvent>) -> String {
    let mut queue = EventQueue::new();
    for event in events {
        queue.push(event);
    }
    encode_batch(&queue.drain())
}

#[test]
fn test_drag_gesture_flushes_as_one_ordered_message() {
    // Arrange: a drag – press, several movement samples, release, lift
    let events = vec![
        InputEvent::press("lmb"),
        InputEvent::movement(1.0, 2.0),
        InputEvent::movement(3.0, 4.0),
        InputEvent::movement(0.5, 0.5),
        InputEvent::release("lmb"),
        InputEvent::End,
    ];

    // Act
    let wire = flush(events);

    // Assert: the three samples arrive as one summed command
    assert_eq!(wire, "press lmb mouse_mv 4.5 6.5 release lmb mouse_end");
}

#[test]
fn test_encoded_batch_decodes_to_the_coalesced_events() {
    // Arrange
    let events = vec![
        InputEvent::movement(1.0, 0.0),
        InputEvent::press("rmb"),
        InputEvent::movement(0.0, 1.0),
        InputEvent::movement(0.0, 1.0),
        InputEvent::Status(SETTINGS_PRESSED.to_string()),
    ];

    // Act
    let decoded = decode_message(&flush(events)).expect("device side must parse the batch");

    // Assert
    assert_eq!(
        decoded,
        vec![
            InputEvent::movement(1.0, 0.0),
            InputEvent::press("rmb"),
            InputEvent::movement(0.0, 2.0),
            InputEvent::Status(SETTINGS_PRESSED.to_string()),
        ]
    );
}

#[test]
fn test_fractional_deltas_survive_the_wire_exactly() {
    // Shortest round-trip formatting means the device side reads back the
    // exact f32 the controller accumulated.
    let dx = 0.1_f32 + 0.2_f32;
    let dy = -1234.5678_f32;

    let wire = flush(vec![InputEvent::movement(dx, dy)]);
    let decoded = decode_message(&wire).unwrap();

    assert_eq!(decoded, vec![InputEvent::movement(dx, dy)]);
}
