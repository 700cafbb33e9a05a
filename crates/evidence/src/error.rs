use thiserror::Error;

use tessera_types::{Evidence, StateError};

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EvidenceError {
    /// The one error block validation must treat as fatal: the evidence
    /// failed verification, was already committed, or appears twice in the
    /// same block.
    #[error("invalid evidence: {reason}")]
    Invalid {
        evidence: Box<Evidence>,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl EvidenceError {
    pub(crate) fn invalid(ev: &Evidence, reason: impl Into<String>) -> Self {
        EvidenceError::Invalid {
            evidence: Box::new(ev.clone()),
            reason: reason.into(),
        }
    }
}
