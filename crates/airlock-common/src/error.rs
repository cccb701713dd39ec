//! Top-level error taxonomy (spec §7). Each component crate defines its own
//! narrower error enum; those convert into `AirlockError` at the orchestrator
//! boundary, mirroring how the teacher's consensus and governance crates each keep
//! a local error type that higher layers wrap rather than flatten.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum AirlockError {
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("scorer unavailable: {0}")]
    ScorerUnavailable(String),

    #[error("proposal conflict: {0}")]
    ProposalConflict(String),

    #[error("vote proof invalid: {0}")]
    VoteProofInvalid(String),

    #[error("threshold not reached before deadline")]
    ThresholdNotReached,

    #[error("vdf failure: {0}")]
    VdfFailure(String),

    #[error("signature assembly error: {0}")]
    SignatureAssemblyError(String),
}
