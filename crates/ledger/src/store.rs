use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::main_chain::MainChain;
use crate::node::{Node, NodeId};
use crate::transaction::{Transaction, TransactionSource};

/// Connection details for a node, as handed out by the tracker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub address: String,
    pub port: u16,
}

/// Name resolution for unknown node ids. Lookups may block on I/O and fail;
/// such failures propagate out of proof decode.
pub trait Tracker: Send + Sync {
    fn lookup(&self, id: NodeId) -> io::Result<NodeInfo>;
}

/// Everything one node holds locally: its own identity, its picture of every
/// peer (chain + meta-knowledge), the main-chain oracle, and the tracker for
/// resolving ids it has never seen.
pub struct LocalStore {
    own_id: NodeId,
    nodes: HashMap<NodeId, Node>,
    main_chain: Arc<dyn MainChain>,
    tracker: Box<dyn Tracker>,
}

impl LocalStore {
    pub fn new(
        own_node: Node,
        main_chain: Arc<dyn MainChain>,
        tracker: Box<dyn Tracker>,
    ) -> Self {
        let own_id = own_node.id;
        let mut nodes = HashMap::new();
        nodes.insert(own_id, own_node);
        LocalStore {
            own_id,
            nodes,
            main_chain,
            tracker,
        }
    }

    pub fn own_id(&self) -> NodeId {
        self.own_id
    }

    pub fn register_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// The node for `id`, consulting the tracker when it is not yet known.
    /// A freshly fetched node starts with an empty chain; its blocks arrive
    /// through proofs.
    pub fn node_or_fetch(&mut self, id: NodeId) -> io::Result<&Node> {
        match self.nodes.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(slot) => {
                let info = self.tracker.lookup(id)?;
                log::debug!("fetched node {} from tracker at {}:{}", id, info.address, info.port);
                Ok(slot.insert(Node::new(info.id, info.address, info.port)))
            }
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn main_chain(&self) -> &dyn MainChain {
        &*self.main_chain
    }

    /// Resolve a source tuple against the locally known chains.
    pub fn resolve_source(&self, source: &TransactionSource) -> Option<&Transaction> {
        self.nodes
            .get(&source.owner)?
            .chain
            .block(source.block_number)?
            .transaction(source.id)
    }
}

/// Tracker that knows nothing; every miss is a hard error. Useful when the
/// node set is fully registered up front.
pub struct NoTracker;

impl Tracker for NoTracker {
    fn lookup(&self, id: NodeId) -> io::Result<NodeInfo> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("node {id} is not registered and no tracker is configured"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_chain::MockMainChain;

    #[test]
    fn fetch_miss_without_tracker_is_an_error() {
        let own = Node::with_genesis(1, "localhost", 4001, 100);
        let mut store = LocalStore::new(own, Arc::new(MockMainChain::new()), Box::new(NoTracker));
        assert_eq!(store.node_count(), 1);
        assert!(store.node_or_fetch(1).is_ok());
        assert!(store.node_or_fetch(2).is_err());
    }

    #[test]
    fn sources_resolve_through_local_chains() {
        let own = Node::with_genesis(1, "localhost", 4001, 100);
        let mut store = LocalStore::new(own, Arc::new(MockMainChain::new()), Box::new(NoTracker));
        store.register_node(Node::with_genesis(2, "localhost", 4002, 100));

        let source = TransactionSource {
            owner: 2,
            block_number: 0,
            id: 0,
        };
        assert!(store.resolve_source(&source).is_some_and(|t| t.is_genesis()));
        let missing = TransactionSource {
            owner: 2,
            block_number: 3,
            id: 0,
        };
        assert!(store.resolve_source(&missing).is_none());
    }
}
