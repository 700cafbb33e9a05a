//! Verifier seam. Cryptographic checks (double-vote signatures, light-client
//! bisection) are the host's concern; the pool drives them through this
//! trait and treats any error as a rejection.

use thiserror::Error;

use tessera_types::{BlockStore, Evidence, State};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("{0}")]
    Invalid(String),
    #[error("no header/commit for height {0}")]
    MissingBlock(u64),
}

pub trait EvidenceVerifier: Send + Sync {
    fn verify(
        &self,
        ev: &Evidence,
        state: &State,
        blocks: &dyn BlockStore,
    ) -> Result<(), VerifyError>;
}
