//! Wire envelope and framing.
//!
//! Every message travels as an [`Envelope`]: a kind byte plus a bincode
//! payload. The kind is redundant with the payload's variant and is
//! cross-checked on decode, so a mislabelled frame is rejected before it is
//! dispatched. Frames are a `u32` big-endian length prefix followed by the
//! encoded envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::message::Message;

pub const MSG_TRANSACTION: u8 = 1;
pub const MSG_PROOF: u8 = 2;
pub const MSG_BLOCK: u8 = 3;
pub const MSG_TRANSACTION_PATTERN: u8 = 6;

/// Upper bound on a frame body. Proofs carry whole chain slices, so the cap
/// is generous, but an absurd length prefix must not allocate.
pub const MAX_FRAME: usize = 1 << 24;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("io")]
    Io(#[from] std::io::Error),
    #[error("bincode")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("envelope kind {got} does not match payload kind {expected}")]
    KindMismatch { expected: u8, got: u8 },
    #[error("frame of {0} bytes exceeds the maximum")]
    Oversize(usize),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: u8,
    pub payload: Vec<u8>,
}

fn kind_of(message: &Message) -> u8 {
    match message {
        Message::Transaction(_) => MSG_TRANSACTION,
        Message::Proof(_) => MSG_PROOF,
        Message::Block(_) => MSG_BLOCK,
        Message::TransactionPattern(_) => MSG_TRANSACTION_PATTERN,
    }
}

pub fn encode_envelope(message: &Message) -> Result<Envelope, WireError> {
    let payload = bincode::serialize(message)?;
    Ok(Envelope {
        kind: kind_of(message),
        payload,
    })
}

pub fn decode_envelope(envelope: &Envelope) -> Result<Message, WireError> {
    let message: Message = bincode::deserialize(&envelope.payload)?;
    let expected = kind_of(&message);
    if envelope.kind != expected {
        return Err(WireError::KindMismatch {
            expected,
            got: envelope.kind,
        });
    }
    Ok(message)
}

pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), WireError> {
    let envelope = encode_envelope(message)?;
    let body = bincode::serialize(&envelope)?;
    if body.len() > MAX_FRAME {
        return Err(WireError::Oversize(body.len()));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, WireError> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME {
        return Err(WireError::Oversize(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    let envelope: Envelope = bincode::deserialize(&body)?;
    decode_envelope(&envelope)
}
