//! Protocol module containing the event model and the text codec.

pub mod codec;
pub mod event;

pub use codec::{decode_message, encode_batch, ProtocolError};
pub use event::InputEvent;
