use thiserror::Error;

/// Failure kinds for a single VDF job (spec §4.1). Fatal for that job only; never
/// propagates to sibling jobs or the proposal that spawned it.
#[derive(Debug, Error, Clone)]
pub enum VdfError {
    #[error("arithmetic error during squaring: {0}")]
    Arithmetic(String),

    #[error("modulus corruption detected")]
    ModulusCorruption,

    #[error("job cancelled")]
    Cancelled,

    #[error("unknown job {0}")]
    UnknownJob(u64),
}
