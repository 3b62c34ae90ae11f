use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// What one node provably knows about every other chain: the highest block
/// number it has learned per peer. Senders consult this to keep proofs
/// minimal; receivers bump it after applying a proof.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetaKnowledge {
    last_known: HashMap<NodeId, u64>,
}

impl MetaKnowledge {
    /// First block of `peer`'s chain that is not yet known; 0 when nothing is.
    pub fn first_unknown_block_number(&self, peer: NodeId) -> u64 {
        self.last_known.get(&peer).map_or(0, |n| n + 1)
    }

    /// Highest known block of `peer`'s chain, `None` when nothing is known.
    pub fn last_known_block_number(&self, peer: NodeId) -> Option<u64> {
        self.last_known.get(&peer).copied()
    }

    /// Merge in a newly learned high-water mark for `peer`.
    pub fn absorb(&mut self, peer: NodeId, last_block_number: u64) {
        self.last_known
            .entry(peer)
            .and_modify(|n| *n = (*n).max(last_block_number))
            .or_insert(last_block_number);
    }

    /// Merge a whole per-owner summary, as produced by
    /// [`Proof::update_summary`](crate::proof::Proof::update_summary).
    pub fn absorb_all(&mut self, summary: &[(NodeId, u64)]) {
        for &(peer, last) in summary {
            self.absorb(peer, last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_peer_has_sentinel_values() {
        let meta = MetaKnowledge::default();
        assert_eq!(meta.first_unknown_block_number(3), 0);
        assert_eq!(meta.last_known_block_number(3), None);
    }

    #[test]
    fn absorb_only_moves_forward() {
        let mut meta = MetaKnowledge::default();
        meta.absorb(3, 5);
        meta.absorb(3, 2);
        assert_eq!(meta.last_known_block_number(3), Some(5));
        assert_eq!(meta.first_unknown_block_number(3), 6);

        meta.absorb_all(&[(3, 9), (4, 0)]);
        assert_eq!(meta.last_known_block_number(3), Some(9));
        assert_eq!(meta.first_unknown_block_number(4), 1);
    }
}
