//! Capability interfaces the orchestrator depends on: scorer, executor, guardian
//! network, and the pre-flight blacklist/pause source. Swappable for testing
//! without touching the core, per spec §9's "dynamic dispatch for adapters".

use crate::types::{Envelope, Fingerprint, RiskScore, ThresholdSignature, Vote};
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ScorerError {
    #[error("scorer timed out")]
    Timeout,
    #[error("scorer transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub sender: String,
    pub destination: String,
    pub value: u128,
    pub payload: Vec<u8>,
    pub chain: String,
}

/// `analyze({sender, destination, value, payload, chain}) -> {score, verdict, explanation?}`.
/// Synchronous from the orchestrator's point of view; any transport is hidden behind
/// the `async` boundary.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn analyze(&self, request: &ScoreRequest) -> Result<RiskScore, ScorerError>;
}

#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("executor rejected envelope: {0}")]
    Rejected(String),
    #[error("executor transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub fingerprint: Fingerprint,
    pub accepted: bool,
    pub detail: Option<String>,
}

/// `submit(envelope) -> receipt`. The executor is the opaque on-chain collaborator;
/// it alone decides what "accepted" means downstream.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn submit(&self, envelope: &Envelope) -> Result<Receipt, ExecutorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyPhase {
    Commit,
    Reveal,
    Complete,
    Expired,
}

#[derive(Debug, Clone)]
pub struct TallySnapshot {
    pub approve: u8,
    pub reject: u8,
    pub abstain: u8,
    pub pending: u8,
    pub phase: TallyPhase,
    pub threshold_signature: Option<ThresholdSignature>,
}

#[derive(Debug, Clone, Error)]
pub enum GuardianNetworkError {
    #[error("guardian network transport error: {0}")]
    Transport(String),
    #[error("unknown proposal {0}")]
    UnknownProposal(String),
}

/// Pull-based guardian network adapter: `submit_commit`, `submit_reveal`,
/// `poll_tally`. A push-based variant MAY stream snapshots instead; the core only
/// ever observes this trait's surface.
#[async_trait]
pub trait GuardianNetwork: Send + Sync {
    async fn submit_commit(
        &self,
        fingerprint: Fingerprint,
        slot: u8,
        commitment_hash: [u8; 32],
    ) -> Result<(), GuardianNetworkError>;

    async fn submit_reveal(
        &self,
        fingerprint: Fingerprint,
        slot: u8,
        vote: Vote,
        proof: Vec<u8>,
    ) -> Result<(), GuardianNetworkError>;

    async fn poll_tally(
        &self,
        fingerprint: Fingerprint,
    ) -> Result<TallySnapshot, GuardianNetworkError>;

    /// Slots whose revealed vote equals `vote`, needed to pick a FROST
    /// signing subset once a tally resolves. The idealized circuit hides
    /// slot identity from the public tally; this core's reveal proof
    /// carries `slot` openly (spec §9's out-of-scope circuit note), so the
    /// network can answer this without breaking any stated invariant.
    async fn participating_slots(
        &self,
        fingerprint: Fingerprint,
        vote: Vote,
    ) -> Result<Vec<u8>, GuardianNetworkError>;
}

/// Copy-on-write snapshot of the blacklist/pause state, taken once at proposal open
/// (spec §5, "global mutable state"). The core never mutates this adapter.
#[derive(Debug, Clone, Default)]
pub struct PauseAndBlacklistSnapshot {
    pub paused: bool,
    pub blacklist: HashSet<String>,
}

pub trait PauseAndBlacklistSource: Send + Sync {
    fn snapshot(&self) -> PauseAndBlacklistSnapshot;
}

/// In-memory mock adapters used by tests across the workspace (and by
/// `airlock-node`'s demo mode). Not gated behind `#[cfg(test)]` since other crates'
/// own test suites depend on them across the crate boundary.
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Always returns a fixed score; swap `score` to drive flagged/unflagged paths.
    pub struct FixedScorer {
        pub score: f64,
    }

    #[async_trait]
    impl Scorer for FixedScorer {
        async fn analyze(&self, _request: &ScoreRequest) -> Result<RiskScore, ScorerError> {
            let verdict = if self.score >= 75.0 {
                crate::types::Verdict::Dangerous
            } else if self.score >= 50.0 {
                crate::types::Verdict::Suspicious
            } else {
                crate::types::Verdict::Safe
            };
            Ok(RiskScore {
                score: self.score,
                verdict,
                explanation: None,
            })
        }
    }

    /// Always times out; used to exercise the scorer-unavailable degrade path.
    pub struct UnavailableScorer;

    #[async_trait]
    impl Scorer for UnavailableScorer {
        async fn analyze(&self, _request: &ScoreRequest) -> Result<RiskScore, ScorerError> {
            Err(ScorerError::Timeout)
        }
    }

    /// Records every envelope it receives for later assertions.
    #[derive(Default)]
    pub struct RecordingExecutor {
        pub received: Mutex<Vec<Envelope>>,
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        async fn submit(&self, envelope: &Envelope) -> Result<Receipt, ExecutorError> {
            self.received.lock().push(envelope.clone());
            Ok(Receipt {
                fingerprint: envelope.fingerprint,
                accepted: true,
                detail: None,
            })
        }
    }

    #[derive(Default)]
    pub struct StaticBlacklist {
        pub paused: bool,
        pub blacklist: HashSet<String>,
    }

    impl PauseAndBlacklistSource for StaticBlacklist {
        fn snapshot(&self) -> PauseAndBlacklistSnapshot {
            PauseAndBlacklistSnapshot {
                paused: self.paused,
                blacklist: self.blacklist.clone(),
            }
        }
    }

    /// In-memory guardian network: stores commits/reveals directly, tallies on poll.
    /// Does not itself enforce commit-before-reveal ordering; that is
    /// `airlock-store`'s and `airlock-voting`'s job, which this mock is deliberately
    /// naive about so tests exercise those crates, not this adapter.
    #[derive(Default)]
    pub struct InMemoryGuardianNetwork {
        commits: Mutex<HashMap<(Fingerprint, u8), [u8; 32]>>,
        reveals: Mutex<HashMap<(Fingerprint, u8), Vote>>,
        finalized: Mutex<HashMap<Fingerprint, ThresholdSignature>>,
        guardian_count: u8,
    }

    impl InMemoryGuardianNetwork {
        pub fn new(guardian_count: u8) -> Self {
            InMemoryGuardianNetwork {
                commits: Mutex::new(HashMap::new()),
                reveals: Mutex::new(HashMap::new()),
                finalized: Mutex::new(HashMap::new()),
                guardian_count,
            }
        }

        pub fn finalize(&self, fingerprint: Fingerprint, sig: ThresholdSignature) {
            self.finalized.lock().insert(fingerprint, sig);
        }
    }

    #[async_trait]
    impl GuardianNetwork for InMemoryGuardianNetwork {
        async fn submit_commit(
            &self,
            fingerprint: Fingerprint,
            slot: u8,
            commitment_hash: [u8; 32],
        ) -> Result<(), GuardianNetworkError> {
            self.commits
                .lock()
                .insert((fingerprint, slot), commitment_hash);
            Ok(())
        }

        async fn submit_reveal(
            &self,
            fingerprint: Fingerprint,
            slot: u8,
            vote: Vote,
            _proof: Vec<u8>,
        ) -> Result<(), GuardianNetworkError> {
            self.reveals.lock().insert((fingerprint, slot), vote);
            Ok(())
        }

        async fn poll_tally(
            &self,
            fingerprint: Fingerprint,
        ) -> Result<TallySnapshot, GuardianNetworkError> {
            let reveals = self.reveals.lock();
            let (mut approve, mut reject, mut abstain) = (0u8, 0u8, 0u8);
            for ((fp, _slot), vote) in reveals.iter() {
                if *fp != fingerprint {
                    continue;
                }
                match vote {
                    Vote::Approve => approve += 1,
                    Vote::Reject => reject += 1,
                    Vote::Abstain => abstain += 1,
                }
            }
            let revealed = approve + reject + abstain;
            let pending = self.guardian_count.saturating_sub(revealed);
            let finalized = self.finalized.lock();
            let phase = if finalized.contains_key(&fingerprint) {
                TallyPhase::Complete
            } else if pending == 0 {
                TallyPhase::Reveal
            } else {
                TallyPhase::Commit
            };
            Ok(TallySnapshot {
                approve,
                reject,
                abstain,
                pending,
                phase,
                threshold_signature: finalized.get(&fingerprint).cloned(),
            })
        }

        async fn participating_slots(
            &self,
            fingerprint: Fingerprint,
            vote: Vote,
        ) -> Result<Vec<u8>, GuardianNetworkError> {
            Ok(self
                .reveals
                .lock()
                .iter()
                .filter(|((fp, _), v)| *fp == fingerprint && **v == vote)
                .map(|((_, slot), _)| *slot)
                .collect())
        }
    }
}
