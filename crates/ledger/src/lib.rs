pub mod block;

pub mod chain;

pub mod chain_view;

pub mod main_chain;

pub mod message;

pub mod meta_knowledge;

pub mod node;

pub mod proof;

pub mod store;

pub mod transaction;

pub mod validation;

pub use block::{AbstractHash, Block, BlockAbstract, GENESIS_BLOCK_NUMBER};

pub use chain::{Chain, ChainError};

pub use chain_view::{ChainView, LightView};

pub use main_chain::{MainChain, MockMainChain};

pub use message::{BlockMessage, ProofMessage, TransactionMessage};

pub use meta_knowledge::MetaKnowledge;

pub use node::{Node, NodeId};

pub use proof::{append_chains, append_chains2, Proof, TransactionPointer};

pub use store::{LocalStore, NoTracker, NodeInfo, Tracker};

pub use transaction::{Transaction, TransactionSource};

pub use validation::{ProofApplyError, ProofBuildError, ProofDecodeError, ProofValidationError};
