//! The concurrent proposal table (spec §4.4). Keyed by `Fingerprint`, each
//! entry is serialized behind its own `parking_lot::Mutex` so that guardians
//! committing/revealing on unrelated proposals never contend, following the
//! per-key-lock-inside-a-`DashMap` pattern in `bleep-state`.

use crate::error::StoreError;
use crate::proposal::{Outcome, Phase, Proposal};
use airlock_common::types::{Fingerprint, Vote};
use airlock_voting::tally::{Tally, TallyOutcome};
use dashmap::DashMap;
use log::{info, warn};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Point-in-time view of a proposal, safe to hand to callers outside the lock.
#[derive(Clone, Debug)]
pub struct ProposalSnapshot {
    pub fingerprint: Fingerprint,
    pub phase: Phase,
    pub tally: Tally,
    pub guardian_count: u8,
    pub finalized: bool,
    pub outcome: Outcome,
    pub vdf_job_id: Option<u64>,
}

#[derive(Default)]
pub struct ProposalStore {
    proposals: DashMap<Fingerprint, Mutex<Proposal>>,
}

impl ProposalStore {
    pub fn new() -> Self {
        ProposalStore {
            proposals: DashMap::new(),
        }
    }

    /// I1 at the store level: a fingerprint may only be opened once while it
    /// has an active (non-finalized) entry.
    pub fn open(
        &self,
        fingerprint: Fingerprint,
        guardian_count: u8,
        approval_threshold: u8,
        rejection_threshold: u8,
        deadline: Duration,
    ) -> Result<(), StoreError> {
        if let Some(existing) = self.proposals.get(&fingerprint) {
            if !existing.lock().is_finalized() {
                return Err(StoreError::DuplicateProposal(fingerprint.to_string()));
            }
        }
        let proposal = Proposal::open(fingerprint, guardian_count, approval_threshold, rejection_threshold, deadline);
        self.proposals.insert(fingerprint, Mutex::new(proposal));
        info!("opened proposal {fingerprint} for {guardian_count} guardian slots");
        Ok(())
    }

    pub fn record_commit(&self, fingerprint: &Fingerprint, slot: u8, hash: [u8; 32]) -> Result<(), StoreError> {
        let entry = self
            .proposals
            .get(fingerprint)
            .ok_or_else(|| StoreError::UnknownProposal(fingerprint.to_string()))?;
        entry.lock().record_commit(slot, hash)
    }

    pub fn record_reveal(
        &self,
        fingerprint: &Fingerprint,
        slot: u8,
        vote: Vote,
    ) -> Result<Option<TallyOutcome>, StoreError> {
        let entry = self
            .proposals
            .get(fingerprint)
            .ok_or_else(|| StoreError::UnknownProposal(fingerprint.to_string()))?;
        entry.lock().record_reveal(slot, vote)
    }

    pub fn commitment_hash(&self, fingerprint: &Fingerprint, slot: u8) -> Result<Option<[u8; 32]>, StoreError> {
        let entry = self
            .proposals
            .get(fingerprint)
            .ok_or_else(|| StoreError::UnknownProposal(fingerprint.to_string()))?;
        Ok(entry.lock().commitment_hash(slot))
    }

    pub fn slots_with_vote(&self, fingerprint: &Fingerprint, vote: Vote) -> Result<Vec<u8>, StoreError> {
        let entry = self
            .proposals
            .get(fingerprint)
            .ok_or_else(|| StoreError::UnknownProposal(fingerprint.to_string()))?;
        Ok(entry.lock().slots_with_vote(vote))
    }

    pub fn set_vdf_job(&self, fingerprint: &Fingerprint, job_id: u64) -> Result<(), StoreError> {
        let entry = self
            .proposals
            .get(fingerprint)
            .ok_or_else(|| StoreError::UnknownProposal(fingerprint.to_string()))?;
        entry.lock().vdf_job_id = Some(job_id);
        Ok(())
    }

    pub fn finalize(&self, fingerprint: &Fingerprint, outcome: Outcome) -> Result<(), StoreError> {
        let entry = self
            .proposals
            .get(fingerprint)
            .ok_or_else(|| StoreError::UnknownProposal(fingerprint.to_string()))?;
        entry.lock().finalize(outcome)
    }

    pub fn snapshot(&self, fingerprint: &Fingerprint) -> Result<ProposalSnapshot, StoreError> {
        let entry = self
            .proposals
            .get(fingerprint)
            .ok_or_else(|| StoreError::UnknownProposal(fingerprint.to_string()))?;
        let proposal = entry.lock();
        Ok(ProposalSnapshot {
            fingerprint: *fingerprint,
            phase: proposal.phase(),
            tally: proposal.tally(),
            guardian_count: proposal.guardian_count,
            finalized: proposal.is_finalized(),
            outcome: proposal.outcome,
            vdf_job_id: proposal.vdf_job_id,
        })
    }

    /// Finalizes every non-finalized proposal whose deadline has passed as of
    /// `now`, returning the fingerprints that expired this sweep. Intended to
    /// be called periodically by the orchestrator's race loop.
    pub fn expire_sweep(&self, now: Instant) -> Vec<Fingerprint> {
        let mut expired = Vec::new();
        for entry in self.proposals.iter() {
            let mut proposal = entry.value().lock();
            if !proposal.is_finalized() && proposal.is_expired_at(now) {
                let _ = proposal.finalize(Outcome::Expired);
                expired.push(*entry.key());
            }
        }
        if !expired.is_empty() {
            warn!("expire sweep finalized {} proposal(s)", expired.len());
        }
        expired
    }

    pub fn remove(&self, fingerprint: &Fingerprint) {
        self.proposals.remove(fingerprint);
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(nonce: u64) -> Fingerprint {
        Fingerprint::derive("0xdead", b"payload", 1, "eth", nonce)
    }

    #[test]
    fn reopening_an_active_proposal_is_rejected() {
        let store = ProposalStore::new();
        store.open(fp(0), 10, 7, 4, Duration::from_secs(300)).unwrap();
        assert_eq!(
            store.open(fp(0), 10, 7, 4, Duration::from_secs(300)),
            Err(StoreError::DuplicateProposal(fp(0).to_string()))
        );
    }

    #[test]
    fn reopening_a_finalized_proposal_succeeds() {
        let store = ProposalStore::new();
        store.open(fp(1), 10, 7, 4, Duration::from_secs(300)).unwrap();
        store.finalize(&fp(1), Outcome::Expired).unwrap();
        store.open(fp(1), 10, 7, 4, Duration::from_secs(300)).unwrap();
    }

    #[test]
    fn unknown_proposal_operations_fail() {
        let store = ProposalStore::new();
        assert_eq!(
            store.record_commit(&fp(2), 0, [0u8; 32]),
            Err(StoreError::UnknownProposal(fp(2).to_string()))
        );
    }

    #[test]
    fn commit_then_reveal_round_trip_reaches_approval() {
        let store = ProposalStore::new();
        let target = fp(3);
        store.open(target, 10, 7, 4, Duration::from_secs(300)).unwrap();
        for slot in 0..7u8 {
            store.record_commit(&target, slot, [slot; 32]).unwrap();
        }
        let mut last = None;
        for slot in 0..7u8 {
            last = store.record_reveal(&target, slot, Vote::Approve).unwrap();
        }
        assert_eq!(last, Some(TallyOutcome::Approved));
        let snap = store.snapshot(&target).unwrap();
        assert!(snap.finalized);
        assert_eq!(snap.outcome, Outcome::Approved);
    }

    #[test]
    fn expire_sweep_finalizes_past_deadline_only() {
        let store = ProposalStore::new();
        let expiring = fp(4);
        let fresh = fp(5);
        store.open(expiring, 10, 7, 4, Duration::from_millis(1)).unwrap();
        store.open(fresh, 10, 7, 4, Duration::from_secs(300)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let expired = store.expire_sweep(Instant::now());
        assert_eq!(expired, vec![expiring]);
        assert!(store.snapshot(&expiring).unwrap().finalized);
        assert!(!store.snapshot(&fresh).unwrap().finalized);
    }
}
