use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("revealed vote {0} is outside the {{reject,approve,abstain}} domain")]
    InvalidVoteDomain(u8),

    #[error("reveal proof does not match the earlier commitment")]
    CommitmentMismatch,

    #[error("reveal proof's guardian-membership secret does not match any known guardian")]
    NotAGuardian,
}
