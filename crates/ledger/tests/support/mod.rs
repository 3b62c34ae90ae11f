//! Shared builders for proof scenario tests.
#![allow(dead_code)] // not every test binary touches every builder

use std::sync::Arc;

use skein_ledger::{
    LocalStore, MockMainChain, NoTracker, Node, NodeId, Transaction, TransactionSource,
};

pub const GENESIS_AMOUNT: u64 = 1000;

pub fn oracle() -> Arc<MockMainChain> {
    Arc::new(MockMainChain::new())
}

/// Store as a node sees the world right after startup: its own chain holds
/// its genesis, peers are registered but their chains are still empty.
pub fn fresh_store(own: NodeId, peers: &[NodeId], oracle: Arc<MockMainChain>) -> LocalStore {
    let own_node = Node::with_genesis(own, "localhost", 4000 + own as u16, GENESIS_AMOUNT);
    let mut store = LocalStore::new(own_node, oracle, Box::new(NoTracker));
    for &peer in peers {
        if peer != own {
            store.register_node(Node::new(peer, "localhost", 4000 + peer as u16));
        }
    }
    store
}

/// Store in which every listed node has its genesis chain: the omniscient
/// sender-side picture scenario setups start from. `ids[0]` is the owner.
pub fn world_store(ids: &[NodeId], oracle: Arc<MockMainChain>) -> LocalStore {
    let own = ids[0];
    let own_node = Node::with_genesis(own, "localhost", 4000 + own as u16, GENESIS_AMOUNT);
    let mut store = LocalStore::new(own_node, oracle, Box::new(NoTracker));
    for &id in &ids[1..] {
        store.register_node(Node::with_genesis(
            id,
            "localhost",
            4000 + id as u16,
            GENESIS_AMOUNT,
        ));
    }
    store
}

pub fn src(owner: NodeId, block_number: u64, id: u32) -> TransactionSource {
    TransactionSource {
        owner,
        block_number,
        id,
    }
}

/// A transfer with block-scoped id 0, ready to be sealed.
pub fn transfer(
    sender: NodeId,
    receiver: NodeId,
    amount: u64,
    remainder: u64,
    sources: Vec<TransactionSource>,
) -> Transaction {
    Transaction::new(0, Some(sender), receiver, amount, remainder, sources)
}

/// Seal `txs` into the next block of `owner`'s chain, returning its number.
pub fn seal(store: &mut LocalStore, owner: NodeId, txs: Vec<Transaction>) -> u64 {
    store
        .node_mut(owner)
        .expect("owner is registered")
        .chain
        .seal_block(txs)
}
