pub mod adapters;
pub mod config;
pub mod error;
pub mod types;

pub use adapters::{
    Executor, ExecutorError, GuardianNetwork, GuardianNetworkError, PauseAndBlacklistSnapshot,
    PauseAndBlacklistSource, Receipt, ScoreRequest, Scorer, ScorerError, TallyPhase, TallySnapshot,
};
pub use config::Config;
pub use error::AirlockError;
pub use types::{
    AirlockOutcome, Envelope, Fingerprint, GuardianId, Intent, OutcomeTag, RiskScore,
    ThresholdSignature, VdfProof, Verdict, Vote,
};
