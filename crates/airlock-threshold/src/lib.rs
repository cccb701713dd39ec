//! FROST-style 7-of-10 threshold Schnorr signatures over Ristretto255 (spec
//! §4.2): distributed key generation (`dkg.rs`) and two-round signing
//! (`signing.rs`), wrapped in an engine that converts to/from the wire-shape
//! `airlock_common::ThresholdSignature`.

pub mod dkg;
pub mod error;
pub mod signing;

pub use dkg::{dkg, GroupKeyMaterial, PersistedKeyMaterial, PersistedShare, SecretShare};
pub use error::ThresholdError;
pub use signing::{verify, Signature};

use airlock_common::error::AirlockError;
use airlock_common::types::ThresholdSignature;
use curve25519_dalek::ristretto::RistrettoPoint;

impl From<ThresholdError> for AirlockError {
    fn from(err: ThresholdError) -> Self {
        AirlockError::SignatureAssemblyError(err.to_string())
    }
}

/// Thin façade over `GroupKeyMaterial` exposing the §4.2 contract
/// (`dkg`, `sign`, `verify`) in terms of `airlock-common`'s wire types, so the
/// orchestrator never has to import `curve25519-dalek` directly.
pub struct ThresholdEngine {
    material: GroupKeyMaterial,
    threshold: u8,
}

impl ThresholdEngine {
    /// Runs DKG once at boot; `threshold` must match spec's `approval_threshold`.
    pub fn bootstrap(guardian_count: u8, threshold: u8) -> Result<Self, ThresholdError> {
        let material = dkg(guardian_count, threshold)?;
        Ok(ThresholdEngine { material, threshold })
    }

    /// Restores a previously-persisted DKG result (spec §6: group pk + slot
    /// shares "MUST survive restarts via the adapter they come through"),
    /// skipping DKG entirely on this boot.
    pub fn from_persisted(persisted: PersistedKeyMaterial, threshold: u8) -> Result<Self, ThresholdError> {
        let material = persisted.into_material()?;
        Ok(ThresholdEngine { material, threshold })
    }

    /// Encodes this engine's key material for the caller to persist.
    pub fn to_persisted(&self) -> PersistedKeyMaterial {
        self.material.to_persisted()
    }

    pub fn group_public_key_bytes(&self) -> [u8; 32] {
        self.material.group_pk.compress().to_bytes()
    }

    /// `sign(msg, participating_slots) -> {R, z}`, converted to the wire shape.
    pub fn sign(&self, msg: &[u8], participating_slots: &[u8]) -> Result<ThresholdSignature, ThresholdError> {
        let mut shares = Vec::with_capacity(participating_slots.len());
        for &slot in participating_slots {
            let share = self
                .material
                .shares
                .get(slot as usize)
                .ok_or(ThresholdError::UnknownParticipant(slot))?;
            shares.push(share);
        }
        let sig = signing::sign(msg, self.threshold, &self.material.group_pk, &shares)?;
        let (r, z) = sig.to_bytes();
        Ok(ThresholdSignature { r, z })
    }

    pub fn verify(&self, msg: &[u8], sig: &ThresholdSignature) -> bool {
        let Some(parsed) = Signature::from_bytes(&sig.r, &sig.z) else {
            return false;
        };
        signing::verify(msg, &self.material.group_pk, &parsed)
    }

    pub fn group_pk_point(&self) -> RistrettoPoint {
        self.material.group_pk
    }
}
