//! In-memory proposal store (spec §4.4): the fingerprint-keyed table of
//! guardian commit/reveal state, owning invariants I1-I4 so that
//! `airlock-orchestrator` never has to reason about concurrent guardian
//! submissions itself.

pub mod error;
pub mod proposal;
pub mod store;

pub use error::StoreError;
pub use proposal::{Outcome, Phase, Proposal};
pub use store::{ProposalSnapshot, ProposalStore};

use airlock_common::error::AirlockError;

impl From<StoreError> for AirlockError {
    fn from(err: StoreError) -> Self {
        AirlockError::ProposalConflict(err.to_string())
    }
}
