use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Wire-level reference to a transaction on some owner's chain.
///
/// Sources are always carried as `(owner, block number, id)` tuples, never as
/// nested transactions, so reference cycles cannot be encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionSource {
    pub owner: NodeId,
    pub block_number: u64,
    pub id: u32,
}

/// A value transfer. The genesis transaction of a chain has no sender.
///
/// `sources` are the inputs this transaction consumes; they are resolved
/// through a chain view or the local store on demand (the tuples are the
/// canonical representation, in memory and on the wire alike).
#[derive(Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Identity of this transaction within its block.
    pub id: u32,
    pub sender: Option<NodeId>,
    pub receiver: NodeId,
    pub amount: u64,
    pub remainder: u64,
    /// Set once the transaction is sealed into a block.
    pub block_number: Option<u64>,
    pub sources: Vec<TransactionSource>,
    /// Memoizes a successful local verification. A failed verification does
    /// not poison the transaction for future proofs.
    #[serde(skip)]
    verified: AtomicBool,
}

impl Transaction {
    pub fn new(
        id: u32,
        sender: Option<NodeId>,
        receiver: NodeId,
        amount: u64,
        remainder: u64,
        sources: Vec<TransactionSource>,
    ) -> Self {
        Transaction {
            id,
            sender,
            receiver,
            amount,
            remainder,
            block_number: None,
            sources,
            verified: AtomicBool::new(false),
        }
    }

    /// Genesis transaction granting `amount` to `owner`.
    pub fn genesis(owner: NodeId, amount: u64) -> Self {
        Transaction::new(0, None, owner, amount, 0, Vec::new())
    }

    pub fn is_genesis(&self) -> bool {
        self.sender.is_none()
    }

    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::Relaxed)
    }

    pub fn mark_verified(&self) {
        self.verified.store(true, Ordering::Relaxed);
    }
}

impl Clone for Transaction {
    fn clone(&self) -> Self {
        Transaction {
            id: self.id,
            sender: self.sender,
            receiver: self.receiver,
            amount: self.amount,
            remainder: self.remainder,
            block_number: self.block_number,
            sources: self.sources.clone(),
            verified: AtomicBool::new(self.is_verified()),
        }
    }
}

// The verification memo is transient state and takes no part in equality.
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.sender == other.sender
            && self.receiver == other.receiver
            && self.amount == other.amount
            && self.remainder == other.remainder
            && self.block_number == other.block_number
            && self.sources == other.sources
    }
}

impl Eq for Transaction {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_memo_is_ignored_by_equality() {
        let a = Transaction::new(3, Some(1), 2, 50, 10, Vec::new());
        let b = a.clone();
        a.mark_verified();
        assert_eq!(a, b);
        assert!(a.is_verified());
        assert!(!b.is_verified());
    }

    #[test]
    fn clone_carries_the_memo() {
        let a = Transaction::genesis(7, 1000);
        a.mark_verified();
        assert!(a.clone().is_verified());
    }
}
