//! Commit-reveal primitives (spec §4.3). `H` is SHA-256 here, standing in for
//! the Poseidon-family algebraic hash a real Circom circuit would use natively
//! (spec §1: "the Circom circuit's internal arithmetic" is out of scope; only
//! the external commitment/proof/public-input interface is specified).

use crate::error::VoteError;
use airlock_common::types::{Fingerprint, Vote};
use log::warn;
use sha2::{Digest, Sha256};

/// `commitment = H(slot, vote, nonce, proposal_id)`.
pub fn commit(slot: u8, vote: Vote, nonce: &[u8; 32], proposal_id: Fingerprint) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([slot]);
    hasher.update([vote as u8]);
    hasher.update(nonce);
    hasher.update(proposal_id.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// One guardian's membership secret hashes to its public identity
/// (`pubkey_set[slot] = H(k)`); this is the "is a legitimate guardian" half of
/// the reveal proof's statement.
pub fn guardian_identity(secret: &[u8; 32]) -> [u8; 32] {
    let digest = Sha256::digest(secret);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// The reveal proof's public/private material. In a real circuit `slot`,
/// `membership_secret` and `nonce` are hidden witnesses and only `vote` is a
/// public output; here they travel together since the circuit itself is out
/// of scope (spec §1, §9) and only its input/output contract is implemented.
#[derive(Clone, Debug)]
pub struct RevealProof {
    pub membership_secret: [u8; 32],
    pub nonce: [u8; 32],
}

/// Checks the reveal proof's statement for public inputs
/// `(proposal_id, commitment, pubkey_set)` and public output `vote`:
/// - `H(membership_secret) == pubkey_set[slot]` (legitimate guardian),
/// - `H(slot, vote, nonce, proposal_id) == commitment` (binds to the commit),
/// - `vote` is a member of the vote domain (guaranteed by the `Vote` type).
///
/// Returns the specific `VoteError` kind on failure so callers can log which
/// half of the statement broke; per spec §7 (`VoteProofInvalid`) every kind
/// here is recovered the same way by the caller (reveal rejected, commit
/// preserved), never promoted to a hard error.
pub fn verify_reveal(
    proposal_id: Fingerprint,
    slot: u8,
    vote: Vote,
    commitment: [u8; 32],
    pubkey_set: &[[u8; 32]],
    proof: &RevealProof,
) -> Result<(), VoteError> {
    let Some(expected_pubkey) = pubkey_set.get(slot as usize) else {
        warn!("reveal for slot {slot} has no corresponding guardian pubkey");
        return Err(VoteError::NotAGuardian);
    };
    if guardian_identity(&proof.membership_secret) != *expected_pubkey {
        warn!("reveal for slot {slot} failed guardian-membership check");
        return Err(VoteError::NotAGuardian);
    }
    if commit(slot, vote, &proof.nonce, proposal_id) != commitment {
        warn!("reveal for slot {slot} does not match its earlier commitment");
        return Err(VoteError::CommitmentMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> Fingerprint {
        Fingerprint::derive("0xdead", b"payload", 1, "eth", 0)
    }

    #[test]
    fn valid_reveal_verifies() {
        let secret = [7u8; 32];
        let nonce = [9u8; 32];
        let slot = 3u8;
        let mut pubkeys = vec![[0u8; 32]; 10];
        pubkeys[slot as usize] = guardian_identity(&secret);
        let commitment = commit(slot, Vote::Approve, &nonce, fp());
        let proof = RevealProof {
            membership_secret: secret,
            nonce,
        };
        assert!(verify_reveal(fp(), slot, Vote::Approve, commitment, &pubkeys, &proof).is_ok());
    }

    #[test]
    fn wrong_slot_pubkey_fails() {
        let secret = [7u8; 32];
        let nonce = [9u8; 32];
        let mut pubkeys = vec![[0u8; 32]; 10];
        pubkeys[3] = guardian_identity(&secret);
        let commitment = commit(3, Vote::Approve, &nonce, fp());
        let proof = RevealProof {
            membership_secret: secret,
            nonce,
        };
        // Claiming slot 4 with slot 3's secret must fail.
        assert_eq!(
            verify_reveal(fp(), 4, Vote::Approve, commitment, &pubkeys, &proof),
            Err(VoteError::NotAGuardian)
        );
    }

    #[test]
    fn tampered_vote_fails_commitment_check() {
        let secret = [1u8; 32];
        let nonce = [2u8; 32];
        let mut pubkeys = vec![[0u8; 32]; 10];
        pubkeys[0] = guardian_identity(&secret);
        let commitment = commit(0, Vote::Reject, &nonce, fp());
        let proof = RevealProof {
            membership_secret: secret,
            nonce,
        };
        assert_eq!(
            verify_reveal(fp(), 0, Vote::Approve, commitment, &pubkeys, &proof),
            Err(VoteError::CommitmentMismatch)
        );
    }
}
