use thiserror::Error;

/// `ProposalConflict` kinds (spec §7): duplicate fingerprint open, double
/// commit, reveal-before-commit, and operations against a finalized proposal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("proposal {0} already exists")]
    DuplicateProposal(String),

    #[error("unknown proposal {0}")]
    UnknownProposal(String),

    #[error("guardian slot {0} is not in 0..guardian_count")]
    UnknownSlot(u8),

    #[error("guardian slot {0} has already committed")]
    DuplicateCommit(u8),

    #[error("guardian slot {0} revealed before committing")]
    RevealBeforeCommit(u8),

    #[error("proposal is already finalized")]
    AlreadyFinalized,
}
