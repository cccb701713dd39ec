//! Domain types shared by every airlock crate: the immutable transaction intent,
//! its derived fingerprint, the risk score, and the final execution envelope.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic identifier of a transaction intent, used as the proposal store's
/// primary key. Derived from `(destination, payload, value, source_chain, nonce)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn derive(
        destination: &str,
        payload: &[u8],
        value: u128,
        source_chain: &str,
        nonce: u64,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(destination.as_bytes());
        hasher.update(payload);
        hasher.update(value.to_be_bytes());
        hasher.update(source_chain.as_bytes());
        hasher.update(nonce.to_be_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Fingerprint(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(self.0))
    }
}

/// Guardian slot identity, `0..guardian_count`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GuardianId(pub u8);

impl fmt::Display for GuardianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guardian[{}]", self.0)
    }
}

impl fmt::Debug for GuardianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuardianId({})", self.0)
    }
}

/// Immutable transaction intent submitted to the airlock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Intent {
    pub caller: String,
    pub destination: String,
    pub value: u128,
    pub payload: Vec<u8>,
    pub source_chain: String,
    pub destination_chain: Option<String>,
    pub nonce: u64,
}

impl Intent {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::derive(
            &self.destination,
            &self.payload,
            self.value,
            &self.source_chain,
            self.nonce,
        )
    }

    pub fn is_well_formed(&self) -> bool {
        !self.destination.is_empty() && self.destination.bytes().any(|b| b != 0)
    }
}

/// Scorer verdict bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Safe,
    Suspicious,
    Dangerous,
}

/// Bounded risk score returned by the scorer adapter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiskScore {
    pub score: f64,
    pub verdict: Verdict,
    pub explanation: Option<String>,
}

impl RiskScore {
    pub fn flagged(&self, flag_threshold: f64) -> bool {
        self.score >= flag_threshold
    }
}

/// Guardian vote cast during reveal, `{reject=0, approve=1, abstain=2}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Vote {
    Reject = 0,
    Approve = 1,
    Abstain = 2,
}

impl Vote {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Vote::Reject),
            1 => Some(Vote::Approve),
            2 => Some(Vote::Abstain),
            _ => None,
        }
    }
}

/// A Wesolowski proof, possibly the distinguished zero-proof produced by bypass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VdfProof {
    pub output: [u8; 32],
    pub witness: Vec<u8>,
    pub iterations: u64,
}

impl VdfProof {
    pub fn zero() -> Self {
        VdfProof {
            output: [0u8; 32],
            witness: Vec::new(),
            iterations: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.iterations == 0 && self.witness.is_empty() && self.output == [0u8; 32]
    }
}

/// A FROST-style aggregated Schnorr signature `(R, z)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdSignature {
    pub r: [u8; 32],
    pub z: [u8; 32],
}

/// The outcome tag carried by a terminal envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeTag {
    Approved,
    Rejected,
    DelayedApproved,
}

impl OutcomeTag {
    /// Byte encoding signed over by the threshold signature; binds the signature to
    /// the specific outcome so a rejection signature cannot be replayed as approval.
    pub fn signing_label(&self) -> &'static [u8] {
        match self {
            OutcomeTag::Approved => b"approved",
            OutcomeTag::Rejected => b"rejected",
            OutcomeTag::DelayedApproved => b"delayed-approved",
        }
    }
}

/// The final artifact produced by the core, consumed once by the executor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub fingerprint: Fingerprint,
    pub vdf_proof: VdfProof,
    pub threshold_signature: ThresholdSignature,
    pub outcome_tag: OutcomeTag,
}

/// Terminal result the orchestrator returns for a single intent (spec §7).
#[derive(Clone, Debug)]
pub enum AirlockOutcome {
    Envelope(Envelope),
    Blocked(String),
    Expired,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = Fingerprint::derive("0xdead", b"payload", 10, "eth", 1);
        let b = Fingerprint::derive("0xdead", b"payload", 10, "eth", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_nonce() {
        let a = Fingerprint::derive("0xdead", b"payload", 10, "eth", 1);
        let b = Fingerprint::derive("0xdead", b"payload", 10, "eth", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn zero_proof_is_recognized() {
        let proof = VdfProof::zero();
        assert!(proof.is_zero());
        assert_eq!(proof.iterations, 0);
    }

    #[test]
    fn nonzero_proof_is_not_zero() {
        let proof = VdfProof {
            output: [1u8; 32],
            witness: vec![1, 2, 3],
            iterations: 50_000,
        };
        assert!(!proof.is_zero());
    }

    #[test]
    fn empty_destination_is_not_well_formed() {
        let intent = Intent {
            caller: "alice".into(),
            destination: String::new(),
            value: 0,
            payload: vec![],
            source_chain: "eth".into(),
            destination_chain: None,
            nonce: 0,
        };
        assert!(!intent.is_well_formed());
    }

    #[test]
    fn flagged_uses_greater_or_equal() {
        let score = RiskScore {
            score: 50.0,
            verdict: Verdict::Suspicious,
            explanation: None,
        };
        assert!(score.flagged(50.0));
        assert!(!score.flagged(50.1));
    }
}
