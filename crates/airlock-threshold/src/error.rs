use thiserror::Error;

/// Failure kinds for DKG and signing (spec §4.2). Signature assembly errors are
/// fatal to the orchestrator's intent; DKG errors are fatal to boot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("fewer than {required} participants supplied a secret share ({got} given)")]
    InsufficientParticipants { required: u8, got: u8 },

    #[error("participant slot {0} supplied a share that failed local verification")]
    InvalidShare(u8),

    #[error("duplicate participant slot {0} in signing set")]
    DuplicateParticipant(u8),

    #[error("participant slot {0} is not part of the guardian key material")]
    UnknownParticipant(u8),

    #[error("dkg requires threshold t in 1..=n, got t={t} n={n}")]
    InvalidDkgParameters { n: u8, t: u8 },

    #[error("persisted key material does not decode to a canonical point or scalar")]
    MalformedPersistedMaterial,
}
