pub mod message;

pub mod wire;

pub use message::{Message, PatternSpec, TransactionPatternMessage};

pub use wire::{
    decode_envelope, encode_envelope, read_message, write_message, Envelope, WireError, MAX_FRAME,
};
