use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::meta_knowledge::MetaKnowledge;

/// Numeric identity of a participant. Assigned by the tracker, unique
/// network-wide.
pub type NodeId = u32;

/// A participant in the ledger. Owns exactly one chain and carries the
/// meta-knowledge table recording what this node provably knows about
/// every other chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub address: String,
    pub port: u16,
    pub chain: Chain,
    pub meta_knowledge: MetaKnowledge,
}

impl Node {
    pub fn new(id: NodeId, address: impl Into<String>, port: u16) -> Self {
        Node {
            id,
            address: address.into(),
            port,
            chain: Chain::new(id),
            meta_knowledge: MetaKnowledge::default(),
        }
    }

    /// Node whose chain starts with a sealed genesis block carrying the
    /// given initial amount.
    pub fn with_genesis(id: NodeId, address: impl Into<String>, port: u16, amount: u64) -> Self {
        Node {
            id,
            address: address.into(),
            port,
            chain: Chain::with_genesis(id, amount),
            meta_knowledge: MetaKnowledge::default(),
        }
    }
}

// Node equality is by identity.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}
