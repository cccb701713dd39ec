//! A single proposal's lifecycle record (spec §3, §4.4). Generalizes
//! `bleep-governance::proposal_lifecycle::ProposalRecord`'s
//! transition-validating state machine from a weighted-stake governance vote
//! to the airlock's fixed-`N` guardian commit-reveal vote.

use crate::error::StoreError;
use airlock_common::types::{Fingerprint, Vote};
use airlock_voting::tally::{Tally, TallyOutcome};
use log::info;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Commit,
    Reveal,
    Complete,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Approved,
    Rejected,
    Expired,
}

pub struct Proposal {
    pub fingerprint: Fingerprint,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub guardian_count: u8,
    pub approval_threshold: u8,
    pub rejection_threshold: u8,
    commit_set: HashMap<u8, [u8; 32]>,
    reveal_set: HashMap<u8, Vote>,
    tally: Tally,
    finalized: bool,
    pub outcome: Outcome,
    pub vdf_job_id: Option<u64>,
}

impl Proposal {
    pub fn open(
        fingerprint: Fingerprint,
        guardian_count: u8,
        approval_threshold: u8,
        rejection_threshold: u8,
        deadline: Duration,
    ) -> Self {
        let created_at = Instant::now();
        Proposal {
            fingerprint,
            created_at,
            expires_at: created_at + deadline,
            guardian_count,
            approval_threshold,
            rejection_threshold,
            commit_set: HashMap::new(),
            reveal_set: HashMap::new(),
            tally: Tally::default(),
            finalized: false,
            outcome: Outcome::Pending,
            vdf_job_id: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// I1: each slot commits at most once.
    pub fn record_commit(&mut self, slot: u8, hash: [u8; 32]) -> Result<(), StoreError> {
        if self.finalized {
            return Err(StoreError::AlreadyFinalized);
        }
        if slot >= self.guardian_count {
            return Err(StoreError::UnknownSlot(slot));
        }
        if self.commit_set.contains_key(&slot) {
            return Err(StoreError::DuplicateCommit(slot));
        }
        self.commit_set.insert(slot, hash);
        Ok(())
    }

    /// I2: a slot may reveal only after committing. Returns `Some(outcome)`
    /// the first time a reveal crosses the approval or rejection threshold
    /// (I4: once decided, no further reveal changes the outcome). Crossing
    /// `rejection_threshold` (as low as `N - approval_threshold + 1`) can
    /// decide the tally before `approval_threshold` guardians have revealed
    /// at all, yet the threshold signature over the outcome still needs that
    /// many signers (spec §4.2, §8 P5) — so reveals from already-committed
    /// slots keep being recorded after the decision, purely to grow the
    /// signing quorum, without ever re-finalizing or flipping `outcome`. A
    /// slot re-revealing after already being counted is a no-op either way,
    /// preserving I3 (`approve + reject + abstain <= N`). Once the proposal
    /// is finalized as `Expired` there is no decision left to attest to, so
    /// reveals are rejected outright.
    pub fn record_reveal(&mut self, slot: u8, vote: Vote) -> Result<Option<TallyOutcome>, StoreError> {
        if slot >= self.guardian_count {
            return Err(StoreError::UnknownSlot(slot));
        }
        if !self.commit_set.contains_key(&slot) {
            return Err(StoreError::RevealBeforeCommit(slot));
        }
        if self.finalized && self.outcome == Outcome::Expired {
            return Err(StoreError::AlreadyFinalized);
        }
        if self.reveal_set.contains_key(&slot) {
            return Ok(None);
        }
        self.reveal_set.insert(slot, vote);
        match vote {
            Vote::Approve => self.tally.approve += 1,
            Vote::Reject => self.tally.reject += 1,
            Vote::Abstain => self.tally.abstain += 1,
        }

        if self.finalized {
            // Decision already made; this reveal only grows the signing
            // quorum available to the orchestrator.
            return Ok(None);
        }

        let decided = self.tally.outcome(self.approval_threshold, self.rejection_threshold);
        match decided {
            TallyOutcome::Approved => {
                self.finalize(Outcome::Approved)?;
                Ok(Some(decided))
            }
            TallyOutcome::Rejected => {
                self.finalize(Outcome::Rejected)?;
                Ok(Some(decided))
            }
            TallyOutcome::Pending => Ok(None),
        }
    }

    pub fn finalize(&mut self, outcome: Outcome) -> Result<(), StoreError> {
        if self.finalized {
            return Err(StoreError::AlreadyFinalized);
        }
        self.finalized = true;
        self.outcome = outcome;
        info!("proposal {} finalized as {:?}", self.fingerprint, self.outcome);
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        if self.finalized {
            return if self.outcome == Outcome::Expired {
                Phase::Expired
            } else {
                Phase::Complete
            };
        }
        if self.commit_set.len() as u8 == self.guardian_count {
            Phase::Reveal
        } else {
            Phase::Commit
        }
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn has_committed(&self, slot: u8) -> bool {
        self.commit_set.contains_key(&slot)
    }

    pub fn has_revealed(&self, slot: u8) -> bool {
        self.reveal_set.contains_key(&slot)
    }

    pub fn commitment_hash(&self, slot: u8) -> Option<[u8; 32]> {
        self.commit_set.get(&slot).copied()
    }

    pub fn revealed_slots(&self) -> Vec<u8> {
        self.reveal_set.keys().copied().collect()
    }

    /// Slots whose revealed vote equals `vote`. Used to pick the FROST
    /// signing subset once a tally crosses a threshold; the idealized
    /// circuit hides slot identity from the public tally, but our
    /// structural stand-in's reveal proof carries `slot` openly (spec §9).
    pub fn slots_with_vote(&self, vote: Vote) -> Vec<u8> {
        self.reveal_set
            .iter()
            .filter(|(_, v)| **v == vote)
            .map(|(s, _)| *s)
            .collect()
    }
}
