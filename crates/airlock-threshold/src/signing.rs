//! FROST-style two-round Schnorr signing over Ristretto255 (spec §4.2). Both
//! rounds run in-process against the caller-supplied participant shares rather
//! than over a real network round-trip (see `dkg.rs`'s module doc for why);
//! the resulting `(R, z)` is the same aggregated Schnorr signature a real
//! multi-round deployment would produce.

use crate::dkg::SecretShare;
use crate::error::ThresholdError;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use log::warn;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

/// A FROST-style aggregated Schnorr signature `(R, z)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r: CompressedRistretto,
    pub z: Scalar,
}

impl Signature {
    pub fn to_bytes(&self) -> ([u8; 32], [u8; 32]) {
        (self.r.to_bytes(), self.z.to_bytes())
    }

    pub fn from_bytes(r: &[u8; 32], z: &[u8; 32]) -> Option<Self> {
        let z = Scalar::from_canonical_bytes(*z).into();
        z.map(|z| Signature {
            r: CompressedRistretto(*r),
            z,
        })
    }
}

fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&digest);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Binding factor `rho_i = H(slot, msg, B)` where `B` is the serialized full
/// nonce-commitment set, binding each share to the whole signing session.
fn binding_factor(slot: u8, msg: &[u8], commitment_set: &[u8]) -> Scalar {
    hash_to_scalar(&[b"FROST-rho", &[slot], msg, commitment_set])
}

/// Challenge `c = H(R, PK, msg)`.
fn challenge(r: &RistrettoPoint, pk: &RistrettoPoint, msg: &[u8]) -> Scalar {
    hash_to_scalar(&[
        b"FROST-challenge",
        r.compress().as_bytes(),
        pk.compress().as_bytes(),
        msg,
    ])
}

/// Lagrange coefficient of `slot` at `x=0`, interpolated over the canonical
/// (sorted, de-duplicated) set of participating 1-based indices.
fn lagrange_coefficient(slot_x: Scalar, all_x: &[Scalar]) -> Scalar {
    let mut num = Scalar::from(1u64);
    let mut den = Scalar::from(1u64);
    for &x_j in all_x {
        if x_j == slot_x {
            continue;
        }
        num *= x_j;
        den *= x_j - slot_x;
    }
    num * den.invert()
}

fn serialize_commitment_set(commitments: &[(u8, RistrettoPoint, RistrettoPoint)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(commitments.len() * 65);
    for (slot, d, e) in commitments {
        out.push(*slot);
        out.extend_from_slice(d.compress().as_bytes());
        out.extend_from_slice(e.compress().as_bytes());
    }
    out
}

/// `sign(msg, participating_slots, |participating_slots| >= t) -> {R, z}`.
/// Refuses duplicate slots (spec invariant); the participant set is sorted
/// canonically before Lagrange coefficients are computed, so signing order
/// never affects the result. Takes the persisted group public key, needed to
/// derive the Fiat-Shamir challenge `c`.
pub fn sign(
    msg: &[u8],
    threshold: u8,
    group_pk: &RistrettoPoint,
    participants: &[&SecretShare],
) -> Result<Signature, ThresholdError> {
    let mut slots: Vec<u8> = participants.iter().map(|s| s.slot).collect();
    slots.sort_unstable();
    for window in slots.windows(2) {
        if window[0] == window[1] {
            return Err(ThresholdError::DuplicateParticipant(window[0]));
        }
    }
    if participants.len() < threshold as usize {
        return Err(ThresholdError::InsufficientParticipants {
            required: threshold,
            got: participants.len() as u8,
        });
    }
    for share in participants {
        if &RISTRETTO_BASEPOINT_TABLE * &share.secret != share.public {
            warn!("share for slot {} failed local verification", share.slot);
            return Err(ThresholdError::InvalidShare(share.slot));
        }
    }

    let mut ordered: Vec<&SecretShare> = participants.to_vec();
    ordered.sort_unstable_by_key(|s| s.slot);

    let mut rng = OsRng;
    let mut nonces: Vec<(Scalar, Scalar)> = Vec::with_capacity(ordered.len());
    let mut commitments: Vec<(u8, RistrettoPoint, RistrettoPoint)> = Vec::with_capacity(ordered.len());
    for share in &ordered {
        let d = Scalar::random(&mut rng);
        let e = Scalar::random(&mut rng);
        let dp = &RISTRETTO_BASEPOINT_TABLE * &d;
        let ep = &RISTRETTO_BASEPOINT_TABLE * &e;
        nonces.push((d, e));
        commitments.push((share.slot, dp, ep));
    }
    let commitment_set = serialize_commitment_set(&commitments);

    let rhos: Vec<Scalar> = ordered
        .iter()
        .map(|share| binding_factor(share.slot, msg, &commitment_set))
        .collect();

    let r_point: RistrettoPoint = commitments
        .iter()
        .zip(&rhos)
        .map(|((_, d, e), rho)| d + e * rho)
        .sum();

    let c = challenge(&r_point, group_pk, msg);

    let all_x: Vec<Scalar> = ordered
        .iter()
        .map(|s| Scalar::from((s.slot as u64) + 1))
        .collect();

    let mut z = Scalar::from(0u64);
    for (i, share) in ordered.iter().enumerate() {
        let (d_i, e_i) = nonces[i];
        let lambda_i = lagrange_coefficient(all_x[i], &all_x);
        let z_i = d_i + rhos[i] * e_i + lambda_i * share.secret * c;
        z += z_i;
    }

    Ok(Signature {
        r: r_point.compress(),
        z,
    })
}

/// `verify(msg, pk, sig) -> bool`: `G^z = R + PK^c`.
pub fn verify(msg: &[u8], group_pk: &RistrettoPoint, sig: &Signature) -> bool {
    let Some(r_point) = sig.r.decompress() else {
        return false;
    };
    let c = challenge(&r_point, group_pk, msg);
    let lhs = &RISTRETTO_BASEPOINT_TABLE * &sig.z;
    let rhs = r_point + group_pk * c;
    lhs == rhs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dkg::dkg;

    #[test]
    fn sign_then_verify_round_trips() {
        let material = dkg(10, 7).unwrap();
        let participants: Vec<&SecretShare> = material.shares.iter().take(7).collect();
        let msg = b"approved";
        let sig = sign(msg, 7, &material.group_pk, &participants).unwrap();
        assert!(verify(msg, &material.group_pk, &sig));
    }

    #[test]
    fn different_signing_subsets_both_verify() {
        let material = dkg(10, 7).unwrap();
        let a: Vec<&SecretShare> = material.shares.iter().take(7).collect();
        let b: Vec<&SecretShare> = material.shares.iter().skip(3).take(7).collect();
        let msg = b"rejected";
        let sig_a = sign(msg, 7, &material.group_pk, &a).unwrap();
        let sig_b = sign(msg, 7, &material.group_pk, &b).unwrap();
        assert!(verify(msg, &material.group_pk, &sig_a));
        assert!(verify(msg, &material.group_pk, &sig_b));
    }

    #[test]
    fn refuses_below_threshold() {
        let material = dkg(10, 7).unwrap();
        let participants: Vec<&SecretShare> = material.shares.iter().take(6).collect();
        let err = sign(b"msg", 7, &material.group_pk, &participants).unwrap_err();
        assert!(matches!(
            err,
            ThresholdError::InsufficientParticipants { required: 7, got: 6 }
        ));
    }

    #[test]
    fn refuses_share_that_fails_local_verification() {
        let material = dkg(10, 7).unwrap();
        let mut tampered = material.shares[0].clone();
        tampered.secret = tampered.secret + Scalar::from(1u64); // public no longer matches secret
        let mut participants: Vec<&SecretShare> = material.shares.iter().skip(1).take(6).collect();
        participants.push(&tampered);
        let err = sign(b"msg", 7, &material.group_pk, &participants).unwrap_err();
        assert!(matches!(err, ThresholdError::InvalidShare(0)));
    }

    #[test]
    fn refuses_duplicate_slots() {
        let material = dkg(10, 7).unwrap();
        let mut participants: Vec<&SecretShare> = material.shares.iter().take(7).collect();
        participants[6] = participants[0];
        let err = sign(b"msg", 7, &material.group_pk, &participants).unwrap_err();
        assert!(matches!(err, ThresholdError::DuplicateParticipant(_)));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let material = dkg(10, 7).unwrap();
        let participants: Vec<&SecretShare> = material.shares.iter().take(7).collect();
        let sig = sign(b"approved", 7, &material.group_pk, &participants).unwrap();
        assert!(!verify(b"rejected", &material.group_pk, &sig));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::dkg::dkg;
    use proptest::prelude::*;

    /// Generates a canonical (sorted, de-duplicated) 7-of-10 subset from a
    /// `Vec<u8>` strategy over the 10 slots, so every subset proptest explores
    /// is itself a valid, duplicate-free signing set.
    fn signing_subset() -> impl Strategy<Value = Vec<u8>> {
        proptest::sample::subsequence((0u8..10).collect::<Vec<_>>(), 7..=10)
    }

    proptest! {
        // R1: verify(sign(m, S), pk, m) = true for any canonical subset S of
        // size >= t, regardless of which 7 (or more) of the 10 slots signed.
        #[test]
        fn sign_verify_round_trips_over_any_quorum_subset(subset in signing_subset()) {
            let material = dkg(10, 7).unwrap();
            let participants: Vec<&SecretShare> = subset
                .iter()
                .map(|&slot| &material.shares[slot as usize])
                .collect();
            let msg = b"delayed-approved";
            let sig = sign(msg, 7, &material.group_pk, &participants).unwrap();
            prop_assert!(verify(msg, &material.group_pk, &sig));
        }
    }
}
