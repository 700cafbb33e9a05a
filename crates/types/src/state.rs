use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Evidence-related consensus parameters, as agreed on chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceParams {
    /// Pending evidence older than this many blocks AND older than
    /// `max_age_duration_ms` is discarded.
    pub max_age_num_blocks: u64,
    pub max_age_duration_ms: u64,
}

impl Default for EvidenceParams {
    fn default() -> Self {
        Self {
            max_age_num_blocks: 100_000,
            max_age_duration_ms: 48 * 60 * 60 * 1000,
        }
    }
}

/// Snapshot of the replicated state the pool needs: where the chain is and
/// what the evidence params say.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub last_block_height: u64,
    pub last_block_time_ms: u64,
    pub evidence_params: EvidenceParams,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to load state: {0}")]
    Load(String),
}

/// Source of the latest committed state. The pool reads it once at startup;
/// afterwards state arrives through `update`.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<State, StateError>;
}
