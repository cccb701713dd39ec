//! Wesolowski VDF engine (spec §4.1): the sequential proof/verify primitives
//! (`wesolowski.rs`) and the job table that tracks progress and bypass over
//! them (`job.rs`).

pub mod error;
pub mod job;
pub mod wesolowski;

pub use error::VdfError;
pub use job::{JobSnapshot, JobStatus, VdfEngine};
pub use wesolowski::modulus;

use airlock_common::error::AirlockError;

impl From<VdfError> for AirlockError {
    fn from(err: VdfError) -> Self {
        AirlockError::VdfFailure(err.to_string())
    }
}
