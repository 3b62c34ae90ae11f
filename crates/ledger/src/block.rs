use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::node::NodeId;
use crate::store::LocalStore;
use crate::transaction::Transaction;

pub const GENESIS_BLOCK_NUMBER: u64 = 0;

/// A numbered container of transactions on one owner's chain.
///
/// Blocks live in their chain's arena; block `n`'s predecessor is block
/// `n - 1` of the same chain, so no back-pointer is stored. Decoded proof
/// blocks are free-standing until `Proof::apply_updates` splices them in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub owner: NodeId,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(number: u64, owner: NodeId, transactions: Vec<Transaction>) -> Self {
        Block {
            number,
            owner,
            transactions,
        }
    }

    /// Look up a transaction by its block-scoped id.
    pub fn transaction(&self, id: u32) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Whether the main chain certifies this block.
    pub fn is_on_main_chain(&self, store: &LocalStore) -> bool {
        store.main_chain().is_block_present(self)
    }

    pub fn to_abstract(&self) -> BlockAbstract {
        BlockAbstract {
            owner: self.owner,
            number: self.number,
        }
    }
}

/// 32-byte digest identifying a committed block abstract on the main chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbstractHash(pub [u8; 32]);

/// The commitment a node publishes to the main chain for one of its blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAbstract {
    pub owner: NodeId,
    pub number: u64,
}

impl BlockAbstract {
    /// Canonical digest over the packed `(number, owner)` pair.
    pub fn digest(&self) -> AbstractHash {
        let mut hasher = Sha3_256::new();
        hasher.update(self.number.to_be_bytes());
        hasher.update(self.owner.to_be_bytes());
        AbstractHash(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_lookup_is_by_id() {
        let block = Block::new(
            2,
            1,
            vec![
                Transaction::new(0, Some(1), 2, 5, 5, Vec::new()),
                Transaction::new(1, Some(1), 3, 4, 1, Vec::new()),
            ],
        );
        assert_eq!(block.transaction(1).map(|t| t.receiver), Some(3));
        assert!(block.transaction(2).is_none());
    }

    #[test]
    fn abstract_digest_is_stable() {
        let a = BlockAbstract { owner: 1, number: 4 };
        assert_eq!(a.digest(), a.digest());
        assert_ne!(a.digest(), BlockAbstract { owner: 2, number: 4 }.digest());
    }
}
