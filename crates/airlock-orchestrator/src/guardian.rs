//! In-process `GuardianNetwork` backed by `airlock-store` and `airlock-voting`,
//! standing in for the pull-based external guardian network of spec §6 when no
//! remote adapter is wired in. Unlike `airlock_common::adapters::mock::InMemoryGuardianNetwork`,
//! this implementation enforces commit/reveal ordering and reveal-proof
//! validity through the real store and voting crates rather than being
//! deliberately naive about them.

use airlock_common::adapters::{GuardianNetwork, GuardianNetworkError, TallyPhase, TallySnapshot};
use airlock_common::types::{Fingerprint, Vote};
use airlock_store::{Phase, ProposalStore};
use airlock_voting::{verify_reveal, RevealProof};
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use std::time::Duration;

/// One guardian's membership secret and the public identity derived from it
/// (`pubkey_set[slot] = H(secret)`). Generated locally since this core has no
/// external guardian key-issuance system; in production the pubkey set would
/// be provisioned out of band and only secrets would stay local to guardians.
#[derive(Clone)]
pub struct GuardianIdentity {
    pub slot: u8,
    pub secret: [u8; 32],
    pub pubkey: [u8; 32],
}

pub fn provision_guardian_identities(guardian_count: u8) -> Vec<GuardianIdentity> {
    (0..guardian_count)
        .map(|slot| {
            let mut secret = [0u8; 32];
            OsRng.fill_bytes(&mut secret);
            let pubkey = airlock_voting::guardian_identity(&secret);
            GuardianIdentity { slot, secret, pubkey }
        })
        .collect()
}

pub struct LocalGuardianNetwork {
    store: ProposalStore,
    pubkey_set: Vec<[u8; 32]>,
    guardian_count: u8,
    approval_threshold: u8,
    rejection_threshold: u8,
    deadline: Duration,
}

impl LocalGuardianNetwork {
    pub fn new(
        pubkey_set: Vec<[u8; 32]>,
        approval_threshold: u8,
        rejection_threshold: u8,
        deadline: Duration,
    ) -> Self {
        let guardian_count = pubkey_set.len() as u8;
        LocalGuardianNetwork {
            store: ProposalStore::new(),
            pubkey_set,
            guardian_count,
            approval_threshold,
            rejection_threshold,
            deadline,
        }
    }

    pub fn store(&self) -> &ProposalStore {
        &self.store
    }

    fn ensure_open(&self, fingerprint: Fingerprint) {
        // Idempotent: the first commit or reveal for a fingerprint lazily opens
        // its store entry; a DuplicateProposal error here just means another
        // guardian already opened it, which is fine.
        let _ = self.store.open(
            fingerprint,
            self.guardian_count,
            self.approval_threshold,
            self.rejection_threshold,
            self.deadline,
        );
    }
}

#[async_trait]
impl GuardianNetwork for LocalGuardianNetwork {
    async fn submit_commit(
        &self,
        fingerprint: Fingerprint,
        slot: u8,
        commitment_hash: [u8; 32],
    ) -> Result<(), GuardianNetworkError> {
        self.ensure_open(fingerprint);
        self.store
            .record_commit(&fingerprint, slot, commitment_hash)
            .map_err(|e| GuardianNetworkError::Transport(e.to_string()))
    }

    async fn submit_reveal(
        &self,
        fingerprint: Fingerprint,
        slot: u8,
        vote: Vote,
        proof: Vec<u8>,
    ) -> Result<(), GuardianNetworkError> {
        let commitment = self
            .store
            .commitment_hash(&fingerprint, slot)
            .map_err(|e| GuardianNetworkError::UnknownProposal(e.to_string()))?
            .ok_or_else(|| GuardianNetworkError::Transport(format!("slot {slot} has not committed")))?;

        let decoded: Option<([u8; 32], [u8; 32])> = bincode::deserialize(&proof).ok();
        let Some((membership_secret, nonce)) = decoded else {
            // Malformed proof: reveal rejected, commit preserved (spec §7,
            // VoteProofInvalid). Not a transport error, just a no-op.
            return Ok(());
        };
        let reveal_proof = RevealProof { membership_secret, nonce };
        if let Err(err) = verify_reveal(fingerprint, slot, vote, commitment, &self.pubkey_set, &reveal_proof) {
            // VoteProofInvalid (spec §7): reveal rejected, commit preserved,
            // not surfaced as a transport error regardless of which half of
            // the reveal statement failed.
            tracing::warn!(%fingerprint, slot, %err, "reveal proof invalid");
            return Ok(());
        }

        self.store
            .record_reveal(&fingerprint, slot, vote)
            .map(|_| ())
            .map_err(|e| GuardianNetworkError::Transport(e.to_string()))
    }

    async fn poll_tally(&self, fingerprint: Fingerprint) -> Result<TallySnapshot, GuardianNetworkError> {
        match self.store.snapshot(&fingerprint) {
            Ok(snap) => {
                let phase = match snap.phase {
                    Phase::Commit => TallyPhase::Commit,
                    Phase::Reveal => TallyPhase::Reveal,
                    Phase::Complete => TallyPhase::Complete,
                    Phase::Expired => TallyPhase::Expired,
                };
                Ok(TallySnapshot {
                    approve: snap.tally.approve,
                    reject: snap.tally.reject,
                    abstain: snap.tally.abstain,
                    pending: snap.tally.pending(snap.guardian_count),
                    phase,
                    threshold_signature: None,
                })
            }
            // No commit has arrived yet; report a virgin snapshot rather than
            // an error so the orchestrator's race loop can keep polling.
            Err(_) => Ok(TallySnapshot {
                approve: 0,
                reject: 0,
                abstain: 0,
                pending: self.guardian_count,
                phase: TallyPhase::Commit,
                threshold_signature: None,
            }),
        }
    }

    async fn participating_slots(
        &self,
        fingerprint: Fingerprint,
        vote: Vote,
    ) -> Result<Vec<u8>, GuardianNetworkError> {
        match self.store.slots_with_vote(&fingerprint, vote) {
            Ok(slots) => Ok(slots),
            Err(_) => Ok(Vec::new()),
        }
    }
}
