use crate::validator::Address;
use serde::{Deserialize, Serialize};

/// Consensus step a vote was cast in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteStep {
    Prevote,
    Precommit,
}

/// A signed consensus vote as carried inside duplicate-vote evidence.
///
/// The pool treats the signature as opaque bytes; checking it is the
/// verifier's job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub height: u64,
    pub round: u32,
    pub step: VoteStep,
    pub block_id: [u8; 32],
    pub timestamp_ms: u64,
    pub validator_address: Address,
    pub validator_index: u32,
    pub signature: Vec<u8>,
}
