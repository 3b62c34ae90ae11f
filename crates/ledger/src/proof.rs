//! Proof construction, decode/relink and recursive verification.
//!
//! A proof bundles, per owner, the chain updates a receiver needs to check
//! an incoming transaction against a committed main-chain anchor: the
//! sender's own updates plus those of every transitively referenced source
//! chain the receiver does not already know.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use parking_lot::Mutex;

use crate::block::Block;
use crate::chain_view::{ChainView, LightView};
use crate::message::{BlockMessage, ProofMessage, TransactionMessage};
use crate::meta_knowledge::MetaKnowledge;
use crate::node::NodeId;
use crate::store::LocalStore;
use crate::transaction::{Transaction, TransactionSource};
use crate::validation::{
    ProofApplyError, ProofBuildError, ProofDecodeError, ProofValidationError,
};

/// Location of the proven transaction: it lives in a block of the sender's
/// chain, reachable through the sender's chain view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransactionPointer {
    pub sender: NodeId,
    pub block_number: u64,
    pub id: u32,
}

impl TransactionPointer {
    fn as_source(&self) -> TransactionSource {
        TransactionSource {
            owner: self.sender,
            block_number: self.block_number,
            id: self.id,
        }
    }
}

/// A decoded or freshly constructed proof. Immutable once decode finishes;
/// `apply_updates` consumes it, handing the blocks over to their chains.
#[derive(Debug)]
pub struct Proof {
    transaction: TransactionPointer,
    chain_updates: BTreeMap<NodeId, Vec<Block>>,
    /// Per-owner view-validity memo. Shared between verifiers fanning out
    /// over the same proof, hence the lock.
    views: Mutex<HashMap<NodeId, bool>>,
    /// Highest oracle-confirmed block per owner, discovered during
    /// verification and persisted onto the chains at apply time.
    anchors: Mutex<HashMap<NodeId, u64>>,
}

impl Proof {
    pub fn new(transaction: TransactionPointer) -> Self {
        Proof {
            transaction,
            chain_updates: BTreeMap::new(),
            views: Mutex::new(HashMap::new()),
            anchors: Mutex::new(HashMap::new()),
        }
    }

    pub fn transaction(&self) -> TransactionPointer {
        self.transaction
    }

    pub fn chain_updates(&self) -> &BTreeMap<NodeId, Vec<Block>> {
        &self.chain_updates
    }

    pub fn number_of_blocks(&self) -> usize {
        self.chain_updates.values().map(Vec::len).sum()
    }

    /// Append a block to its owner's update run.
    pub fn add_block(&mut self, block: Block) {
        self.chain_updates.entry(block.owner).or_default().push(block);
    }

    /// Per-owner highest update numbers, the meta-knowledge delta this proof
    /// carries.
    pub fn update_summary(&self) -> Vec<(NodeId, u64)> {
        self.chain_updates
            .iter()
            .filter_map(|(owner, updates)| updates.last().map(|b| (*owner, b.number)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Construction (sender side)
    // ------------------------------------------------------------------

    /// Build the proof for sending `transaction` to `receiver`: compute the
    /// chain closure, then slice each owner's chain from the receiver's
    /// first unknown block through the highest referenced one, committed or
    /// not.
    pub fn build(
        transaction: TransactionPointer,
        receiver: NodeId,
        store: &LocalStore,
    ) -> Result<Self, ProofBuildError> {
        let pointer = transaction.as_source();
        let tx = store
            .resolve_source(&pointer)
            .ok_or(ProofBuildError::MissingSource {
                owner: pointer.owner,
                block_number: pointer.block_number,
                id: pointer.id,
            })?;

        let mut needed = BTreeMap::new();
        append_chains2(store.node_count(), tx, receiver, store, &mut needed)?;

        let receiver_meta = &store
            .node(receiver)
            .ok_or(ProofBuildError::UnknownNode(receiver))?
            .meta_knowledge;

        let mut proof = Proof::new(transaction);
        for (owner, highest) in needed {
            let chain = &store
                .node(owner)
                .ok_or(ProofBuildError::UnknownNode(owner))?
                .chain;
            let first = receiver_meta.first_unknown_block_number(owner);
            let slice = chain.range(first, highest);
            if !slice.is_empty() {
                proof.chain_updates.insert(owner, slice.to_vec());
            }
        }
        Ok(proof)
    }

    // ------------------------------------------------------------------
    // Decode (receiver side)
    // ------------------------------------------------------------------

    /// Reconstruct a proof from the wire and relink its cross-references.
    ///
    /// Pass A checks that every owner's update run is contiguous and chains
    /// onto a locally known predecessor. Pass B resolves every source tuple
    /// through the proof's own updates or the local chains, fetching unknown
    /// owners from the tracker first. A proof that fails either pass is
    /// rejected before verification starts.
    pub fn decode(
        message: &ProofMessage,
        store: &mut LocalStore,
    ) -> Result<Self, ProofDecodeError> {
        let sender = message
            .transaction
            .sender_id
            .ok_or(ProofDecodeError::MissingSender)?;
        let block_number = message
            .transaction
            .block_number
            .ok_or(ProofDecodeError::MissingBlockNumber)?;
        store.node_or_fetch(sender)?;

        let mut chain_updates = BTreeMap::new();
        for (&owner, block_messages) in &message.chain_updates {
            store.node_or_fetch(owner)?;
            let blocks: Vec<Block> = block_messages.iter().map(BlockMessage::to_block).collect();
            chain_updates.insert(owner, blocks);
        }

        let proof = Proof {
            transaction: TransactionPointer {
                sender,
                block_number,
                id: message.transaction.number,
            },
            chain_updates,
            views: Mutex::new(HashMap::new()),
            anchors: Mutex::new(HashMap::new()),
        };

        proof.fix_previous_block_pointers(store)?;
        proof.fix_transaction_sources(store)?;
        proof.locate_transaction(store)?;
        Ok(proof)
    }

    /// Pass A. With arena-owned chains there is no pointer to write; the
    /// back-links are implied by position, so this validates what the
    /// original re-linking assumed: a contiguous run whose first block either
    /// starts a chain or continues one the receiver already holds.
    fn fix_previous_block_pointers(&self, store: &LocalStore) -> Result<(), ProofDecodeError> {
        for (&owner, updates) in &self.chain_updates {
            let Some(first) = updates.first() else {
                continue;
            };
            for (i, block) in updates.iter().enumerate() {
                if block.owner != owner {
                    return Err(ProofDecodeError::ForeignBlock {
                        node: owner,
                        number: block.number,
                    });
                }
                if block.number != first.number + i as u64 {
                    return Err(ProofDecodeError::NonContiguousUpdates {
                        node: owner,
                        number: block.number,
                    });
                }
            }
            if first.number != 0 {
                let chain = &store
                    .node(owner)
                    .ok_or(ProofDecodeError::UnknownNode(owner))?
                    .chain;
                if chain.block(first.number - 1).is_none() {
                    return Err(ProofDecodeError::MissingPredecessor {
                        node: owner,
                        number: first.number,
                    });
                }
            }
        }
        Ok(())
    }

    /// Pass B. Every source tuple of every bundled transaction must resolve,
    /// either through the update run of an owner in the proof or through a
    /// locally known chain. Owners seen only in source tuples are fetched
    /// from the tracker before resolution.
    fn fix_transaction_sources(&self, store: &mut LocalStore) -> Result<(), ProofDecodeError> {
        let mut source_owners = HashSet::new();
        for updates in self.chain_updates.values() {
            for block in updates {
                for tx in &block.transactions {
                    for source in &tx.sources {
                        if !self.chain_updates.contains_key(&source.owner) {
                            source_owners.insert(source.owner);
                        }
                    }
                }
            }
        }
        for owner in source_owners {
            store.node_or_fetch(owner)?;
        }

        for updates in self.chain_updates.values() {
            for block in updates {
                for tx in &block.transactions {
                    for source in &tx.sources {
                        self.resolve_update_source(store, source)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_update_source<'a>(
        &'a self,
        store: &'a LocalStore,
        source: &TransactionSource,
    ) -> Result<&'a Transaction, ProofDecodeError> {
        let chain = &store
            .node(source.owner)
            .ok_or(ProofDecodeError::UnknownNode(source.owner))?
            .chain;
        let block = match self.chain_updates.get(&source.owner) {
            Some(updates) => LightView::new(chain, updates).get_block(source.block_number),
            None => chain.block(source.block_number),
        };
        let block = block.ok_or(ProofDecodeError::UnknownSourceBlock {
            owner: source.owner,
            block_number: source.block_number,
        })?;
        block
            .transaction(source.id)
            .ok_or(ProofDecodeError::UnknownSourceTransaction {
                owner: source.owner,
                block_number: source.block_number,
                id: source.id,
            })
    }

    /// The proven transaction itself must be reachable through the sender's
    /// (unvalidated) view; view validity is judged later, during verify.
    fn locate_transaction(&self, store: &LocalStore) -> Result<(), ProofDecodeError> {
        match self.resolve_update_source(store, &self.transaction.as_source()) {
            Ok(_) => Ok(()),
            Err(ProofDecodeError::UnknownSourceBlock { .. })
            | Err(ProofDecodeError::UnknownSourceTransaction { .. }) => {
                Err(ProofDecodeError::UnknownTransaction {
                    node: self.transaction.sender,
                    block_number: self.transaction.block_number,
                    id: self.transaction.id,
                })
            }
            Err(other) => Err(other),
        }
    }

    // ------------------------------------------------------------------
    // Verification (receiver side)
    // ------------------------------------------------------------------

    /// Verify the proven transaction and, recursively, every transitive
    /// source, against the local chains overlaid with this proof's updates.
    /// Read-only: a failed verification leaves local state untouched.
    pub fn verify(&self, store: &LocalStore) -> Result<(), ProofValidationError> {
        let tx = self.resolve_transaction(store)?;
        if tx.sender.is_none() {
            return Err(ProofValidationError::UnattributedSender);
        }
        let mut in_progress = Vec::new();
        self.verify_transaction(tx, store, &mut in_progress)
    }

    fn resolve_transaction<'a>(
        &'a self,
        store: &'a LocalStore,
    ) -> Result<&'a Transaction, ProofValidationError> {
        let pointer = self.transaction.as_source();
        self.resolve_source(store, &pointer)
            .ok_or(ProofValidationError::TransactionNotFound {
                node: self.transaction.sender,
                id: self.transaction.id,
            })
    }

    fn resolve_source<'a>(
        &'a self,
        store: &'a LocalStore,
        source: &TransactionSource,
    ) -> Option<&'a Transaction> {
        match self.chain_updates.get(&source.owner) {
            Some(updates) => {
                let chain = &store.node(source.owner)?.chain;
                LightView::new(chain, updates)
                    .get_block(source.block_number)?
                    .transaction(source.id)
            }
            None => store.resolve_source(source),
        }
    }

    fn verify_transaction<'a>(
        &'a self,
        tx: &'a Transaction,
        store: &'a LocalStore,
        in_progress: &mut Vec<(NodeId, u64, u32)>,
    ) -> Result<(), ProofValidationError> {
        if tx.is_verified() {
            return Ok(());
        }
        let block_number = tx
            .block_number
            .ok_or(ProofValidationError::MissingBlockNumber)?;

        let Some(sender) = tx.sender else {
            self.verify_genesis_transaction(tx, block_number, store)?;
            tx.mark_verified();
            return Ok(());
        };

        // The protocol assumes a DAG of sources; fail closed on a cycle
        // instead of recursing forever.
        let key = (sender, block_number, tx.id);
        if in_progress.contains(&key) {
            return Err(ProofValidationError::SourceCycle {
                owner: sender,
                block_number,
                id: tx.id,
            });
        }
        in_progress.push(key);
        let result = self
            .verify_chain_with_transaction(tx, sender, block_number, store)
            .and_then(|()| self.verify_source_transactions(tx, store, in_progress));
        in_progress.pop();
        result?;

        tx.mark_verified();
        Ok(())
    }

    /// Walk the sender's chain view checking that the transaction occurs
    /// exactly once and that some block at or after it is certified by the
    /// main chain (the anchor).
    fn verify_chain_with_transaction(
        &self,
        tx: &Transaction,
        sender: NodeId,
        block_number: u64,
        store: &LocalStore,
    ) -> Result<(), ProofValidationError> {
        let view = self.chain_view(store, sender)?;
        if !view.is_valid() {
            return Err(ProofValidationError::InvalidChainView { node: sender });
        }

        // An occurrence is a transaction with the same block-scoped id,
        // sender and claimed block number; matching on the claim is what
        // lets a copy smuggled into a second block be caught at all.
        let occurs = |t: &Transaction| {
            t.id == tx.id && t.sender == tx.sender && t.block_number == tx.block_number
        };

        let mut seen = false;
        let mut anchored = false;
        for block in view.iter() {
            if block.transactions.iter().any(occurs) {
                if seen {
                    return Err(ProofValidationError::DuplicateTransaction {
                        node: sender,
                        id: tx.id,
                    });
                }
                seen = true;
            }

            if !anchored && block.number >= block_number {
                if view.last_committed().is_some_and(|c| c >= block.number) {
                    anchored = true;
                } else if block.is_on_main_chain(store) {
                    // A freshly confirmed anchor; remembered so apply can
                    // ratchet the chain's committed mark.
                    self.record_anchor(sender, block.number);
                    anchored = true;
                }
            }
        }

        if !seen {
            return Err(ProofValidationError::TransactionNotFound {
                node: sender,
                id: tx.id,
            });
        }
        if !anchored {
            return Err(ProofValidationError::NoCommittedAnchor {
                node: sender,
                block_number,
            });
        }
        Ok(())
    }

    fn verify_source_transactions<'a>(
        &'a self,
        tx: &'a Transaction,
        store: &'a LocalStore,
        in_progress: &mut Vec<(NodeId, u64, u32)>,
    ) -> Result<(), ProofValidationError> {
        for source in &tx.sources {
            let resolved = self.resolve_source(store, source).ok_or(
                ProofValidationError::MissingSource {
                    owner: source.owner,
                    block_number: source.block_number,
                    id: source.id,
                },
            )?;
            self.verify_transaction(resolved, store, in_progress)
                .map_err(|cause| ProofValidationError::SourceInvalid {
                    owner: source.owner,
                    block_number: source.block_number,
                    id: source.id,
                    cause: Box::new(cause),
                })?;
        }
        Ok(())
    }

    /// A genesis transaction is valid iff it sits in block 0 of its
    /// receiver's chain and that block is certified by the main chain.
    fn verify_genesis_transaction(
        &self,
        tx: &Transaction,
        block_number: u64,
        store: &LocalStore,
    ) -> Result<(), ProofValidationError> {
        if block_number != 0 {
            return Err(ProofValidationError::BadGenesis { block_number });
        }
        let receiver = tx.receiver;
        let view = self.chain_view(store, receiver)?;
        if !view.is_valid() {
            return Err(ProofValidationError::InvalidChainView { node: receiver });
        }
        let genesis = view
            .get_block(0)
            .ok_or(ProofValidationError::MissingGenesisBlock { node: receiver })?;
        if !genesis.is_on_main_chain(store) {
            return Err(ProofValidationError::GenesisNotCommitted { node: receiver });
        }
        self.record_anchor(receiver, 0);
        Ok(())
    }

    fn record_anchor(&self, owner: NodeId, number: u64) {
        let mut anchors = self.anchors.lock();
        let entry = anchors.entry(owner).or_insert(number);
        *entry = (*entry).max(number);
    }

    /// The chain view for `node`, overlaying this proof's updates on the
    /// locally known chain. Validity is computed once per node and memoized
    /// under the proof's lock, so concurrent verifiers cannot race two
    /// inserts.
    pub fn chain_view<'a>(
        &'a self,
        store: &'a LocalStore,
        node: NodeId,
    ) -> Result<ChainView<'a>, ProofValidationError> {
        let chain = &store
            .node(node)
            .ok_or(ProofValidationError::UnknownNode(node))?
            .chain;
        let updates = self
            .chain_updates
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let valid = {
            let mut memo = self.views.lock();
            match memo.get(&node) {
                Some(&valid) => valid,
                None => {
                    let valid = ChainView::new(chain, updates).is_valid();
                    memo.insert(node, valid);
                    valid
                }
            }
        };
        Ok(ChainView::with_validity(chain, updates, valid))
    }

    // ------------------------------------------------------------------
    // Apply (receiver side, after successful verification)
    // ------------------------------------------------------------------

    /// Splice every owner's updates into its local chain, then credit the
    /// proof's sender with knowledge of everything the proof carried. Each
    /// chain is swapped atomically; the proof gives up ownership of its
    /// blocks here.
    ///
    /// The anchors verification confirmed against the oracle are persisted
    /// as each chain's committed mark, so a later proof cannot rewrite a
    /// prefix the main chain already certified.
    pub fn apply_updates(self, store: &mut LocalStore) -> Result<(), ProofApplyError> {
        let summary = self.update_summary();
        let sender = self.transaction.sender;
        let anchors = self.anchors.into_inner();

        for (owner, updates) in self.chain_updates {
            let node = store
                .node_mut(owner)
                .ok_or(ProofApplyError::UnknownNode(owner))?;
            node.chain.update(updates)?;
        }

        for (owner, number) in anchors {
            let node = store
                .node_mut(owner)
                .ok_or(ProofApplyError::UnknownNode(owner))?;
            node.chain.mark_committed(number)?;
        }

        let sender_node = store
            .node_mut(sender)
            .ok_or(ProofApplyError::UnknownNode(sender))?;
        sender_node.meta_knowledge.absorb_all(&summary);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Encode (sender side)
    // ------------------------------------------------------------------

    pub fn to_message(&self, store: &LocalStore) -> Result<ProofMessage, ProofBuildError> {
        let pointer = self.transaction.as_source();
        let tx = self
            .resolve_source(store, &pointer)
            .ok_or(ProofBuildError::MissingSource {
                owner: pointer.owner,
                block_number: pointer.block_number,
                id: pointer.id,
            })?;
        Ok(ProofMessage {
            transaction: TransactionMessage::from(tx),
            chain_updates: self
                .chain_updates
                .iter()
                .map(|(owner, updates)| {
                    (*owner, updates.iter().map(BlockMessage::from).collect())
                })
                .collect(),
        })
    }
}

/// Collect the chains whose updates must accompany `transaction` on its way
/// to `receiver`, pruned by the receiver's meta-knowledge (first-unknown
/// cutoff) and capped at `nr_of_nodes - 1` chains.
pub fn append_chains(
    nr_of_nodes: usize,
    transaction: &Transaction,
    receiver: NodeId,
    meta_knowledge: &MetaKnowledge,
    store: &LocalStore,
    chains: &mut BTreeSet<NodeId>,
) -> Result<(), ProofBuildError> {
    let mut visited = HashSet::new();
    append_chains_inner(
        nr_of_nodes,
        transaction,
        receiver,
        meta_knowledge,
        store,
        chains,
        &mut visited,
    )
}

fn append_chains_inner(
    nr_of_nodes: usize,
    transaction: &Transaction,
    receiver: NodeId,
    meta_knowledge: &MetaKnowledge,
    store: &LocalStore,
    chains: &mut BTreeSet<NodeId>,
    visited: &mut HashSet<(NodeId, u64, u32)>,
) -> Result<(), ProofBuildError> {
    let Some(owner) = transaction.sender else {
        return Ok(());
    };
    if owner == receiver {
        return Ok(());
    }
    let block_number = transaction.block_number.ok_or(ProofBuildError::Unsealed)?;
    if !visited.insert((owner, block_number, transaction.id)) {
        return Ok(());
    }

    if meta_knowledge.first_unknown_block_number(owner) >= block_number {
        return Ok(());
    }

    chains.insert(owner);
    if chains.len() >= nr_of_nodes.saturating_sub(1) {
        return Ok(());
    }

    for source in &transaction.sources {
        let resolved =
            store
                .resolve_source(source)
                .ok_or(ProofBuildError::MissingSource {
                    owner: source.owner,
                    block_number: source.block_number,
                    id: source.id,
                })?;
        append_chains_inner(
            nr_of_nodes,
            resolved,
            receiver,
            meta_knowledge,
            store,
            chains,
            visited,
        )?;
    }
    Ok(())
}

/// Like [`append_chains`] but keyed on the receiver's last-known cutoff and
/// accumulating the highest referenced block number per owner, which is what
/// the proof slicer needs.
pub fn append_chains2(
    nr_of_nodes: usize,
    transaction: &Transaction,
    receiver: NodeId,
    store: &LocalStore,
    chains: &mut BTreeMap<NodeId, u64>,
) -> Result<(), ProofBuildError> {
    let meta_knowledge = &store
        .node(receiver)
        .ok_or(ProofBuildError::UnknownNode(receiver))?
        .meta_knowledge;
    let mut visited = HashSet::new();
    append_chains2_inner(
        nr_of_nodes,
        transaction,
        receiver,
        meta_knowledge,
        store,
        chains,
        &mut visited,
    )
}

fn append_chains2_inner(
    nr_of_nodes: usize,
    transaction: &Transaction,
    receiver: NodeId,
    meta_knowledge: &MetaKnowledge,
    store: &LocalStore,
    chains: &mut BTreeMap<NodeId, u64>,
    visited: &mut HashSet<(NodeId, u64, u32)>,
) -> Result<(), ProofBuildError> {
    let Some(owner) = transaction.sender else {
        return Ok(());
    };
    if owner == receiver {
        return Ok(());
    }
    let block_number = transaction.block_number.ok_or(ProofBuildError::Unsealed)?;
    if !visited.insert((owner, block_number, transaction.id)) {
        return Ok(());
    }

    if meta_knowledge
        .last_known_block_number(owner)
        .is_some_and(|last| last >= block_number)
    {
        return Ok(());
    }

    chains
        .entry(owner)
        .and_modify(|highest| *highest = (*highest).max(block_number))
        .or_insert(block_number);
    if chains.len() >= nr_of_nodes.saturating_sub(1) {
        return Ok(());
    }

    for source in &transaction.sources {
        let resolved =
            store
                .resolve_source(source)
                .ok_or(ProofBuildError::MissingSource {
                    owner: source.owner,
                    block_number: source.block_number,
                    id: source.id,
                })?;
        append_chains2_inner(
            nr_of_nodes,
            resolved,
            receiver,
            meta_knowledge,
            store,
            chains,
            visited,
        )?;
    }
    Ok(())
}
