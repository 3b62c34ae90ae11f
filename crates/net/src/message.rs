use serde::{Deserialize, Serialize};

use skein_ledger::{BlockMessage, ProofMessage, TransactionMessage};

/// Description of a transaction pattern, transmissible so a coordinator can
/// install the same pattern on every node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternSpec {
    /// Pick a receiver uniformly at random, wait a uniform interval between
    /// sends.
    Uniform { min_wait_ms: u64, max_wait_ms: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPatternMessage {
    pub pattern: PatternSpec,
}

/// Everything one node can say to another. The receiver dispatches on the
/// variant; the envelope's kind byte is cross-checked against it on decode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Transaction(TransactionMessage),
    Proof(ProofMessage),
    Block(BlockMessage),
    TransactionPattern(TransactionPatternMessage),
}
