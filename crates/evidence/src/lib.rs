//! Evidence pool for a BFT replicated state machine.
//!
//! Collects proof of validator misbehavior from gossip and local consensus,
//! verifies and persists it, serves it to the block proposer within a byte
//! budget, promotes it to committed when its block finalizes, and expires
//! what outlives the consensus evidence-age parameters.

pub mod store;

pub mod broadcast;

pub mod verify;

pub mod error;

pub mod pool;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(not(feature = "metrics"))]
pub mod metrics_shim;

// When the metrics feature is off, expose a unified `metrics` via the shim
#[cfg(not(feature = "metrics"))]
pub use self::metrics_shim as metrics;

pub use store::{EvidenceStore, PendingEntry, StoreCfg, StoreError};

pub use broadcast::{BroadcastQueue, QueueEntry};

pub use verify::{EvidenceVerifier, VerifyError};

pub use error::EvidenceError;

pub use pool::Pool;
