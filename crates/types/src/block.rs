use crate::validator::Address;
use serde::{Deserialize, Serialize};

pub type BlockId = [u8; 32];

/// Header fields the evidence verifier needs to cross-check against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub height: u64,
    pub block_id: BlockId,
    pub time_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSig {
    pub validator_address: Address,
    pub signature: Vec<u8>,
}

/// The commit that finalized a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub height: u64,
    pub block_id: BlockId,
    pub signatures: Vec<CommitSig>,
}

/// Read-only access to finalized headers and commits, for the verifier.
/// The pool itself never reads blocks; it just passes this through.
pub trait BlockStore: Send + Sync {
    fn block_meta(&self, height: u64) -> Option<BlockMeta>;
    fn commit(&self, height: u64) -> Option<Commit>;
}
