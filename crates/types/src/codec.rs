//! Canonical byte encoding for evidence. bincode end to end: what goes in
//! the store and what block-size accounting measures.

use crate::evidence::Evidence;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("codec error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
}

pub fn evidence_to_bytes(ev: &Evidence) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serialize(ev)?)
}

pub fn evidence_from_bytes(bytes: &[u8]) -> Result<Evidence, CodecError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Serialized size of a whole evidence list, as it would be carried in a
/// block. Used by the proposer to stay under its byte budget.
pub fn evidence_list_size(list: &[Evidence]) -> Result<u64, CodecError> {
    Ok(bincode::serialized_size(&list)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{DuplicateVoteEvidence, Evidence};
    use crate::vote::{Vote, VoteStep};

    fn sample() -> Evidence {
        let vote = |tag: u8| Vote {
            height: 3,
            round: 1,
            step: VoteStep::Prevote,
            block_id: [tag; 32],
            timestamp_ms: 42,
            validator_address: [7; 20],
            validator_index: 2,
            signature: vec![1, 2, 3],
        };
        Evidence::DuplicateVote(DuplicateVoteEvidence {
            vote_a: vote(1),
            vote_b: vote(2),
            total_voting_power: 30,
            validator_power: 10,
            timestamp_ms: 42,
        })
    }

    #[test]
    fn roundtrip() {
        let ev = sample();
        let bytes = evidence_to_bytes(&ev).unwrap();
        let back = evidence_from_bytes(&bytes).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn list_size_grows_with_entries() {
        let one = evidence_list_size(&[sample()]).unwrap();
        let two = evidence_list_size(&[sample(), sample()]).unwrap();
        assert!(two > one);
        assert!(one > 0);
    }
}
