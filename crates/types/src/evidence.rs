//! Evidence of validator misbehavior: the two variants the pool recognizes,
//! their fingerprints, and stateless shape validation.

use crate::block::BlockId;
use crate::hash::EvidenceHash;
use crate::validator::Validator;
use crate::vote::Vote;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use thiserror::Error;

/// Two conflicting votes signed by the same validator for the same
/// height/round/step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateVoteEvidence {
    pub vote_a: Vote,
    pub vote_b: Vote,
    /// Total voting power of the validator set at the offending height.
    pub total_voting_power: u64,
    /// Voting power of the offending validator.
    pub validator_power: u64,
    pub timestamp_ms: u64,
}

/// A light-client attack: a set of validators signed a header that conflicts
/// with the canonical chain. The pool only inspects the byzantine-validator
/// list; everything else is the verifier's business.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightClientAttackEvidence {
    /// Height of the conflicting header.
    pub height: u64,
    /// Hash of the conflicting header.
    pub conflicting_block_id: BlockId,
    /// Last height at which the attacked client and the canonical chain agree.
    pub common_height: u64,
    /// Validators that signed the conflicting header, in canonical order
    /// (descending voting power, ties by address).
    pub byzantine_validators: Vec<Validator>,
    pub total_voting_power: u64,
    pub timestamp_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Evidence {
    DuplicateVote(DuplicateVoteEvidence),
    LightClientAttack(LightClientAttackEvidence),
}

/// Shape errors detectable without any chain state.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("votes are from different validators")]
    VoteAuthorMismatch,
    #[error("votes do not refer to the same height/round/step")]
    VoteTargetMismatch,
    #[error("votes are for the same block")]
    VotesAgree,
    #[error("no byzantine validators named")]
    EmptyByzantineSet,
    #[error("common height {common} is above attack height {height}")]
    CommonHeightAboveAttack { common: u64, height: u64 },
}

impl Evidence {
    /// Height at which the misbehavior occurred.
    pub fn height(&self) -> u64 {
        match self {
            Evidence::DuplicateVote(ev) => ev.vote_a.height,
            Evidence::LightClientAttack(ev) => ev.height,
        }
    }

    /// Block time at the offending height, milliseconds since the epoch.
    pub fn time_ms(&self) -> u64 {
        match self {
            Evidence::DuplicateVote(ev) => ev.timestamp_ms,
            Evidence::LightClientAttack(ev) => ev.timestamp_ms,
        }
    }

    /// Stable fingerprint over the fields that identify the misbehavior.
    ///
    /// For duplicate votes that is the vote pair. For a light-client attack
    /// it is the conflicting header plus the common height; the
    /// byzantine-validator list is derived metadata and deliberately
    /// excluded, which is what lets `check_evidence` find a stored copy of
    /// the same attack and reconcile the lists instead of re-verifying.
    pub fn hash(&self) -> EvidenceHash {
        let mut hasher = Sha3_256::new();
        match self {
            Evidence::DuplicateVote(ev) => {
                hasher.update([0u8]);
                let votes = bincode::serialize(&(&ev.vote_a, &ev.vote_b))
                    .expect("vote encoding is infallible");
                hasher.update(&votes);
            }
            Evidence::LightClientAttack(ev) => {
                hasher.update([1u8]);
                hasher.update(ev.conflicting_block_id);
                hasher.update(ev.common_height.to_be_bytes());
            }
        }
        let out = hasher.finalize();
        let mut h = [0u8; 32];
        h.copy_from_slice(&out[..32]);
        EvidenceHash(h)
    }

    /// Stateless shape checks. Anything that needs validator sets, headers,
    /// or signatures belongs to the verifier.
    pub fn validate_basic(&self) -> Result<(), StructuralError> {
        match self {
            Evidence::DuplicateVote(ev) => {
                let (a, b) = (&ev.vote_a, &ev.vote_b);
                if a.validator_address != b.validator_address {
                    return Err(StructuralError::VoteAuthorMismatch);
                }
                if a.height != b.height || a.round != b.round || a.step != b.step {
                    return Err(StructuralError::VoteTargetMismatch);
                }
                if a.block_id == b.block_id {
                    return Err(StructuralError::VotesAgree);
                }
                Ok(())
            }
            Evidence::LightClientAttack(ev) => {
                if ev.byzantine_validators.is_empty() {
                    return Err(StructuralError::EmptyByzantineSet);
                }
                if ev.common_height > ev.height {
                    return Err(StructuralError::CommonHeightAboveAttack {
                        common: ev.common_height,
                        height: ev.height,
                    });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::VoteStep;

    fn vote(block_tag: u8) -> Vote {
        Vote {
            height: 7,
            round: 0,
            step: VoteStep::Precommit,
            block_id: [block_tag; 32],
            timestamp_ms: 1_000,
            validator_address: [9; 20],
            validator_index: 0,
            signature: vec![0; 64],
        }
    }

    fn dup_vote() -> Evidence {
        Evidence::DuplicateVote(DuplicateVoteEvidence {
            vote_a: vote(1),
            vote_b: vote(2),
            total_voting_power: 100,
            validator_power: 10,
            timestamp_ms: 1_000,
        })
    }

    fn lca(byz: Vec<Validator>) -> Evidence {
        Evidence::LightClientAttack(LightClientAttackEvidence {
            height: 10,
            conflicting_block_id: [5; 32],
            common_height: 4,
            byzantine_validators: byz,
            total_voting_power: 100,
            timestamp_ms: 1_000,
        })
    }

    #[test]
    fn hash_is_stable_and_content_addressed() {
        let a = dup_vote();
        let b = dup_vote();
        assert_eq!(a.hash(), b.hash());

        let mut other = dup_vote();
        if let Evidence::DuplicateVote(ref mut ev) = other {
            ev.vote_b.block_id = [3; 32];
        }
        assert_ne!(a.hash(), other.hash());
    }

    #[test]
    fn attack_identity_ignores_byzantine_list() {
        let one = lca(vec![Validator {
            address: [1; 20],
            voting_power: 5,
        }]);
        let two = lca(vec![
            Validator {
                address: [1; 20],
                voting_power: 5,
            },
            Validator {
                address: [2; 20],
                voting_power: 3,
            },
        ]);
        // same attack, different claimed participants
        assert_eq!(one.hash(), two.hash());

        let mut other_block = lca(vec![]);
        if let Evidence::LightClientAttack(ref mut ev) = other_block {
            ev.conflicting_block_id = [6; 32];
        }
        assert_ne!(one.hash(), other_block.hash());
    }

    #[test]
    fn duplicate_vote_shape_checks() {
        assert!(dup_vote().validate_basic().is_ok());

        let mut same_block = dup_vote();
        if let Evidence::DuplicateVote(ref mut ev) = same_block {
            ev.vote_b.block_id = ev.vote_a.block_id;
        }
        assert!(matches!(
            same_block.validate_basic(),
            Err(StructuralError::VotesAgree)
        ));

        let mut other_author = dup_vote();
        if let Evidence::DuplicateVote(ref mut ev) = other_author {
            ev.vote_b.validator_address = [8; 20];
        }
        assert!(matches!(
            other_author.validate_basic(),
            Err(StructuralError::VoteAuthorMismatch)
        ));
    }

    #[test]
    fn light_client_attack_shape_checks() {
        let ok = lca(vec![Validator {
            address: [1; 20],
            voting_power: 5,
        }]);
        assert!(ok.validate_basic().is_ok());

        let empty = lca(vec![]);
        assert!(matches!(
            empty.validate_basic(),
            Err(StructuralError::EmptyByzantineSet)
        ));

        let mut inverted = lca(vec![Validator {
            address: [1; 20],
            voting_power: 5,
        }]);
        if let Evidence::LightClientAttack(ref mut ev) = inverted {
            ev.common_height = 11;
        }
        assert!(matches!(
            inverted.validate_basic(),
            Err(StructuralError::CommonHeightAboveAttack { .. })
        ));
    }
}
