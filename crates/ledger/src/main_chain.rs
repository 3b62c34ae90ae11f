use std::collections::HashSet;

use parking_lot::Mutex;

use crate::block::{AbstractHash, Block, BlockAbstract};
use crate::node::NodeId;

/// The external commit log certifying blocks. A block is "on the main chain"
/// iff the oracle says so for the block itself or for a later block of the
/// same chain; this module only defines the consumer-side contract.
pub trait MainChain: Send + Sync {
    fn init(&self) {}

    /// Commit a block abstract, returning its handle on the main chain.
    fn commit_abstract(&self, block_abstract: &BlockAbstract) -> AbstractHash;

    fn is_present(&self, hash: &AbstractHash) -> bool;

    fn is_block_present(&self, block: &Block) -> bool;

    fn current_height(&self) -> u64;

    fn stop(&self) {}
}

/// Deterministic in-memory oracle used by tests and local runs.
///
/// The returned hash is the packed `(block number, owner id)` pair, so
/// commitment state can be reconstructed from the hash alone.
pub struct MockMainChain {
    committed: Mutex<HashSet<(NodeId, u64)>>,
    permissive: bool,
}

impl MockMainChain {
    /// Oracle that certifies only explicitly committed abstracts.
    pub fn new() -> Self {
        MockMainChain {
            committed: Mutex::new(HashSet::new()),
            permissive: false,
        }
    }

    /// Oracle that answers "committed" for everything, whatever was actually
    /// committed. Mirrors the throwaway backend used in single-process runs.
    pub fn permissive() -> Self {
        MockMainChain {
            committed: Mutex::new(HashSet::new()),
            permissive: true,
        }
    }

    /// Mark `(owner, number)` committed without going through an abstract.
    pub fn commit(&self, owner: NodeId, number: u64) {
        self.committed.lock().insert((owner, number));
    }

    fn packed(block_abstract: &BlockAbstract) -> AbstractHash {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&block_abstract.number.to_be_bytes());
        bytes[8..12].copy_from_slice(&block_abstract.owner.to_be_bytes());
        AbstractHash(bytes)
    }

    fn unpack(hash: &AbstractHash) -> (NodeId, u64) {
        let mut number = [0u8; 8];
        number.copy_from_slice(&hash.0[..8]);
        let mut owner = [0u8; 4];
        owner.copy_from_slice(&hash.0[8..12]);
        (NodeId::from_be_bytes(owner), u64::from_be_bytes(number))
    }
}

impl Default for MockMainChain {
    fn default() -> Self {
        MockMainChain::new()
    }
}

impl MainChain for MockMainChain {
    fn commit_abstract(&self, block_abstract: &BlockAbstract) -> AbstractHash {
        self.committed
            .lock()
            .insert((block_abstract.owner, block_abstract.number));
        Self::packed(block_abstract)
    }

    fn is_present(&self, hash: &AbstractHash) -> bool {
        self.permissive || self.committed.lock().contains(&Self::unpack(hash))
    }

    fn is_block_present(&self, block: &Block) -> bool {
        self.permissive || self.committed.lock().contains(&(block.owner, block.number))
    }

    fn current_height(&self) -> u64 {
        self.committed.lock().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_then_query_round_trips_through_the_hash() {
        let oracle = MockMainChain::new();
        let abs = BlockAbstract { owner: 2, number: 1 };
        let block = Block::new(1, 2, Vec::new());

        assert!(!oracle.is_block_present(&block));
        let hash = oracle.commit_abstract(&abs);
        assert!(oracle.is_present(&hash));
        assert!(oracle.is_block_present(&block));
        assert_eq!(oracle.current_height(), 1);
    }

    #[test]
    fn permissive_oracle_certifies_everything() {
        let oracle = MockMainChain::permissive();
        assert!(oracle.is_block_present(&Block::new(9, 9, Vec::new())));
    }
}
