//! Transmissible payloads for transactions, blocks and proofs.
//!
//! Messages reference transactions by `(owner, block number, id)` tuples
//! instead of nesting them, which keeps the encoding cycle-free; the decode
//! pass relinks the references against local state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::node::NodeId;
use crate::transaction::{Transaction, TransactionSource};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMessage {
    /// Block-scoped id of the transaction ("number" on the wire).
    pub number: u32,
    pub sender_id: Option<NodeId>,
    pub receiver_id: NodeId,
    pub amount: u64,
    pub remainder: u64,
    pub block_number: Option<u64>,
    pub sources: Vec<TransactionSource>,
}

impl From<&Transaction> for TransactionMessage {
    fn from(tx: &Transaction) -> Self {
        TransactionMessage {
            number: tx.id,
            sender_id: tx.sender,
            receiver_id: tx.receiver,
            amount: tx.amount,
            remainder: tx.remainder,
            block_number: tx.block_number,
            sources: tx.sources.clone(),
        }
    }
}

impl TransactionMessage {
    pub fn to_transaction(&self) -> Transaction {
        let mut tx = Transaction::new(
            self.number,
            self.sender_id,
            self.receiver_id,
            self.amount,
            self.remainder,
            self.sources.clone(),
        );
        tx.block_number = self.block_number;
        tx
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub number: u64,
    pub owner_id: NodeId,
    pub transactions: Vec<TransactionMessage>,
}

impl From<&Block> for BlockMessage {
    fn from(block: &Block) -> Self {
        BlockMessage {
            number: block.number,
            owner_id: block.owner,
            transactions: block.transactions.iter().map(Into::into).collect(),
        }
    }
}

impl BlockMessage {
    pub fn to_block(&self) -> Block {
        Block::new(
            self.number,
            self.owner_id,
            self.transactions
                .iter()
                .map(TransactionMessage::to_transaction)
                .collect(),
        )
    }
}

/// A proof on the wire: the proven transaction plus the per-owner block
/// updates the receiver needs to verify it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofMessage {
    pub transaction: TransactionMessage,
    pub chain_updates: BTreeMap<NodeId, Vec<BlockMessage>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_message_round_trips() {
        let mut tx = Transaction::new(
            0,
            Some(1),
            2,
            40,
            60,
            vec![TransactionSource {
                owner: 1,
                block_number: 0,
                id: 0,
            }],
        );
        tx.block_number = Some(1);
        let block = Block::new(1, 1, vec![tx]);

        let message = BlockMessage::from(&block);
        assert_eq!(message.to_block(), block);
    }
}
