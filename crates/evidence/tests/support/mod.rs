#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use tessera_evidence::{EvidenceStore, EvidenceVerifier, Pool, VerifyError};
use tessera_types::{
    BlockMeta, BlockStore, Commit, DuplicateVoteEvidence, Evidence, EvidenceParams,
    LightClientAttackEvidence, State, StateError, StateStore, Validator, Vote, VoteStep,
};

/// Some fixed wall-clock base so test times read as offsets.
pub const T0: u64 = 1_700_000_000_000;

pub fn temp_store() -> (EvidenceStore, TempDir) {
    let tmp = TempDir::new().unwrap();
    let store = EvidenceStore::open_default(tmp.path()).unwrap();
    (store, tmp)
}

pub struct MemStateStore {
    state: Mutex<State>,
}

impl MemStateStore {
    pub fn new(state: State) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }
}

impl StateStore for MemStateStore {
    fn load(&self) -> Result<State, StateError> {
        Ok(self.state.lock().clone())
    }
}

pub struct MemBlockStore;

impl BlockStore for MemBlockStore {
    fn block_meta(&self, _height: u64) -> Option<BlockMeta> {
        None
    }

    fn commit(&self, _height: u64) -> Option<Commit> {
        None
    }
}

/// Stand-in for the host's cryptographic verifier: everything checks out.
pub struct AcceptAllVerifier;

impl EvidenceVerifier for AcceptAllVerifier {
    fn verify(
        &self,
        _ev: &Evidence,
        _state: &State,
        _blocks: &dyn BlockStore,
    ) -> Result<(), VerifyError> {
        Ok(())
    }
}

/// Rejects everything, so tests can tell the fast path from the slow path.
pub struct RejectVerifier(pub &'static str);

impl EvidenceVerifier for RejectVerifier {
    fn verify(
        &self,
        _ev: &Evidence,
        _state: &State,
        _blocks: &dyn BlockStore,
    ) -> Result<(), VerifyError> {
        Err(VerifyError::Invalid(self.0.to_string()))
    }
}

pub fn state_at(height: u64, time_ms: u64) -> State {
    State {
        last_block_height: height,
        last_block_time_ms: time_ms,
        evidence_params: EvidenceParams {
            max_age_num_blocks: 20,
            max_age_duration_ms: 1_200_000,
        },
    }
}

pub fn new_pool(store: EvidenceStore, state: State) -> Pool {
    Pool::new(
        store,
        MemStateStore::new(state),
        Arc::new(MemBlockStore),
        Arc::new(AcceptAllVerifier),
    )
    .unwrap()
}

pub fn new_rejecting_pool(store: EvidenceStore, state: State, reason: &'static str) -> Pool {
    Pool::new(
        store,
        MemStateStore::new(state),
        Arc::new(MemBlockStore),
        Arc::new(RejectVerifier(reason)),
    )
    .unwrap()
}

/// Distinct duplicate-vote evidence at the given height/time; `tag` keeps
/// fingerprints apart.
pub fn dup_vote_ev(height: u64, time_ms: u64, tag: u8) -> Evidence {
    let vote = |block: u8| Vote {
        height,
        round: 0,
        step: VoteStep::Precommit,
        block_id: [block; 32],
        timestamp_ms: time_ms,
        validator_address: [tag; 20],
        validator_index: 0,
        signature: vec![tag; 64],
    };
    Evidence::DuplicateVote(DuplicateVoteEvidence {
        vote_a: vote(1),
        vote_b: vote(2),
        total_voting_power: 100,
        validator_power: 10,
        timestamp_ms: time_ms,
    })
}

pub fn lca_ev(height: u64, time_ms: u64, block_tag: u8, byz: Vec<Validator>) -> Evidence {
    Evidence::LightClientAttack(LightClientAttackEvidence {
        height,
        conflicting_block_id: [block_tag; 32],
        common_height: height.saturating_sub(2),
        byzantine_validators: byz,
        total_voting_power: 100,
        timestamp_ms: time_ms,
    })
}

pub fn val(tag: u8, power: u64) -> Validator {
    Validator {
        address: [tag; 20],
        voting_power: power,
    }
}
