use thiserror::Error;

use crate::chain::ChainError;
use crate::node::NodeId;

/// Why a received proof was rejected. All of these are fatal for the proof
/// at hand: the worker logs the rejection and drops the transaction, never
/// retrying the same payload.
#[derive(Debug, Error)]
pub enum ProofValidationError {
    #[error("a received transaction must have an attributed sender")]
    UnattributedSender,

    #[error("chain view of node {node} is invalid")]
    InvalidChainView { node: NodeId },

    #[error("transaction {id} of node {node} not found in any block")]
    TransactionNotFound { node: NodeId, id: u32 },

    #[error("transaction {id} of node {node} appears in more than one block")]
    DuplicateTransaction { node: NodeId, id: u32 },

    #[error("no committed block found at or after block {block_number} of node {node}")]
    NoCommittedAnchor { node: NodeId, block_number: u64 },

    #[error("the transaction has no block number")]
    MissingBlockNumber,

    #[error("genesis transaction claims block {block_number}, expected block 0")]
    BadGenesis { block_number: u64 },

    #[error("the genesis block of node {node} cannot be found")]
    MissingGenesisBlock { node: NodeId },

    #[error("the genesis block of node {node} is not on the main chain")]
    GenesisNotCommitted { node: NodeId },

    #[error("source {owner}/{block_number}/{id} is not valid")]
    SourceInvalid {
        owner: NodeId,
        block_number: u64,
        id: u32,
        #[source]
        cause: Box<ProofValidationError>,
    },

    #[error("source {owner}/{block_number}/{id} cannot be resolved")]
    MissingSource {
        owner: NodeId,
        block_number: u64,
        id: u32,
    },

    #[error("cycle in the source graph at {owner}/{block_number}/{id}")]
    SourceCycle {
        owner: NodeId,
        block_number: u64,
        id: u32,
    },

    #[error("node {0} is not known locally")]
    UnknownNode(NodeId),
}

/// Why a proof message could not be reconstructed. Decode failures mean the
/// message is dropped before verification even starts.
#[derive(Debug, Error)]
pub enum ProofDecodeError {
    #[error("the proven transaction has no sender")]
    MissingSender,

    #[error("the proven transaction has no block number")]
    MissingBlockNumber,

    #[error("node {0} is not known locally")]
    UnknownNode(NodeId),

    #[error("updates of node {node} are not contiguous at block {number}")]
    NonContiguousUpdates { node: NodeId, number: u64 },

    #[error("update block {number} does not belong to node {node}")]
    ForeignBlock { node: NodeId, number: u64 },

    #[error("predecessor of block {number} of node {node} is not known locally")]
    MissingPredecessor { node: NodeId, number: u64 },

    #[error("source block {block_number} of node {owner} is not available")]
    UnknownSourceBlock { owner: NodeId, block_number: u64 },

    #[error("source transaction {id} in block {block_number} of node {owner} is not available")]
    UnknownSourceTransaction {
        owner: NodeId,
        block_number: u64,
        id: u32,
    },

    #[error("proven transaction {id} not found in block {block_number} of node {node}")]
    UnknownTransaction {
        node: NodeId,
        block_number: u64,
        id: u32,
    },

    #[error("tracker lookup failed")]
    Tracker(#[from] std::io::Error),
}

/// Why a proof could not be constructed on the sending side.
#[derive(Debug, Error)]
pub enum ProofBuildError {
    #[error("node {0} is not known locally")]
    UnknownNode(NodeId),

    #[error("the transaction has not been sealed into a block")]
    Unsealed,

    #[error("source {owner}/{block_number}/{id} cannot be resolved locally")]
    MissingSource {
        owner: NodeId,
        block_number: u64,
        id: u32,
    },
}

/// Why a verified proof still failed to apply. With a well-behaved sender
/// this does not happen; a failure leaves the local chains unchanged from
/// the failing owner onward.
#[derive(Debug, Error)]
pub enum ProofApplyError {
    #[error("node {0} is not known locally")]
    UnknownNode(NodeId),

    #[error(transparent)]
    Chain(#[from] ChainError),
}
