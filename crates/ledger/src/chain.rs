use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::Block;
use crate::node::NodeId;
use crate::transaction::Transaction;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("block {got} does not continue the update run (expected {expected})")]
    NonContiguous { expected: u64, got: u64 },
    #[error("block {number} of node {owner} applied to chain of node {chain_owner}")]
    ForeignBlock {
        owner: NodeId,
        number: u64,
        chain_owner: NodeId,
    },
    #[error("update at block {number} would rewrite the committed prefix (committed up to {last_committed})")]
    RewritesCommitted { number: u64, last_committed: u64 },
    #[error("update at block {number} does not attach to a chain of height {height}")]
    Detached { number: u64, height: u64 },
    #[error("committed mark {number} is beyond the chain height {height}")]
    MarkBeyondHeight { number: u64, height: u64 },
}

/// Append-only sequence of blocks owned by one node, numbered from 0.
///
/// The prefix up to `last_committed` is immutable; `update` may only revise
/// the uncommitted tail. The chain owns its blocks (arena style); a block's
/// predecessor is simply the preceding slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chain {
    owner: NodeId,
    blocks: Vec<Block>,
    last_committed: Option<u64>,
}

impl Chain {
    pub fn new(owner: NodeId) -> Self {
        Chain {
            owner,
            blocks: Vec::new(),
            last_committed: None,
        }
    }

    /// Chain whose block 0 holds the genesis transaction for `amount`.
    pub fn with_genesis(owner: NodeId, amount: u64) -> Self {
        let mut chain = Chain::new(owner);
        chain.seal_block(vec![Transaction::genesis(owner, amount)]);
        chain
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Number of blocks, i.e. one past the last block number.
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, number: u64) -> Option<&Block> {
        self.blocks.get(number as usize)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Highest block number known to be committed on the main chain, if any.
    pub fn last_committed(&self) -> Option<u64> {
        self.last_committed
    }

    /// Ratchet the committed mark upward. Never moves backwards.
    pub fn mark_committed(&mut self, number: u64) -> Result<(), ChainError> {
        if number >= self.height() {
            return Err(ChainError::MarkBeyondHeight {
                number,
                height: self.height(),
            });
        }
        if self.last_committed.map_or(true, |c| number > c) {
            self.last_committed = Some(number);
        }
        Ok(())
    }

    /// Seal `transactions` into the next block, stamping their block number.
    /// Returns the number of the sealed block.
    pub fn seal_block(&mut self, mut transactions: Vec<Transaction>) -> u64 {
        let number = self.height();
        for tx in &mut transactions {
            tx.block_number = Some(number);
        }
        self.blocks.push(Block::new(number, self.owner, transactions));
        number
    }

    /// Blocks `first..=last`, clamped to the chain. Used when slicing updates
    /// into a proof.
    pub fn range(&self, first: u64, last: u64) -> &[Block] {
        let lo = (first as usize).min(self.blocks.len());
        let hi = (last.saturating_add(1) as usize).min(self.blocks.len());
        &self.blocks[lo..hi.max(lo)]
    }

    /// Splice `updates` onto the tail of this chain: everything from the
    /// first update's number onward is replaced. The committed prefix is
    /// untouchable, and the run must attach without a gap.
    ///
    /// This is the sole writer of local chains; it runs only after the proof
    /// carrying the updates verified successfully.
    pub fn update(&mut self, updates: Vec<Block>) -> Result<(), ChainError> {
        let Some(first) = updates.first() else {
            return Ok(());
        };
        let first_number = first.number;

        for (i, block) in updates.iter().enumerate() {
            if block.owner != self.owner {
                return Err(ChainError::ForeignBlock {
                    owner: block.owner,
                    number: block.number,
                    chain_owner: self.owner,
                });
            }
            let expected = first_number + i as u64;
            if block.number != expected {
                return Err(ChainError::NonContiguous {
                    expected,
                    got: block.number,
                });
            }
        }

        if let Some(committed) = self.last_committed {
            if first_number <= committed {
                return Err(ChainError::RewritesCommitted {
                    number: first_number,
                    last_committed: committed,
                });
            }
        }
        if first_number > self.height() {
            return Err(ChainError::Detached {
                number: first_number,
                height: self.height(),
            });
        }

        self.blocks.truncate(first_number as usize);
        self.blocks.extend(updates);
        Ok(())
    }
}
