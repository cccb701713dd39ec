//! Commit-reveal ZK vote engine (spec §4.3): commitment derivation, the
//! reveal-proof contract, and tally rules. The proposal-local commit/reveal
//! *state machine* (who has committed, who has revealed, when it becomes
//! terminal) lives in `airlock-store`, which is the component spec §4.4
//! assigns ownership of that state to; this crate is the stateless math those
//! operations call into.

pub mod commitment;
pub mod error;
pub mod tally;

pub use commitment::{commit, guardian_identity, verify_reveal, RevealProof};
pub use error::VoteError;
pub use tally::{Tally, TallyOutcome};

use airlock_common::error::AirlockError;

impl From<VoteError> for AirlockError {
    fn from(err: VoteError) -> Self {
        AirlockError::VoteProofInvalid(err.to_string())
    }
}
