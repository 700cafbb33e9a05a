pub mod hash;

pub mod vote;

pub mod validator;

pub mod evidence;

pub mod codec;

pub mod state;

pub mod block;

pub use hash::EvidenceHash;

pub use vote::{Vote, VoteStep};

pub use validator::{sort_by_voting_power, Address, Validator};

pub use evidence::{
    DuplicateVoteEvidence, Evidence, LightClientAttackEvidence, StructuralError,
};

pub use codec::{
    evidence_from_bytes, evidence_list_size, evidence_to_bytes, CodecError,
};

pub use state::{EvidenceParams, State, StateError, StateStore};

pub use block::{BlockId, BlockMeta, BlockStore, Commit, CommitSig};
