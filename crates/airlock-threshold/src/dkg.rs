//! Distributed Key Generation (spec §4.2). Each of the `n` guardian slots
//! contributes a degree-(t-1) polynomial over the Ristretto255 scalar field;
//! shares are exchanged and summed; the group public key is the sum of each
//! slot's constant-term commitment. Run once at boot; the caller persists the
//! result (spec §6, "DKG output... MUST survive restarts via the adapter they
//! come through").
//!
//! This crate runs all `n` contributions in-process rather than over a network
//! round-trip, since the airlock core treats DKG as a one-shot boot step with a
//! single trust domain holding all shares (see DESIGN.md).

use crate::error::ThresholdError;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use log::info;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// One guardian slot's share of the group secret key. `secret` is zeroized on
/// drop; `public` is the slot's own verification point `G * secret`.
#[derive(Clone)]
pub struct SecretShare {
    pub slot: u8,
    pub(crate) secret: Scalar,
    pub public: RistrettoPoint,
}

impl Drop for SecretShare {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Output of a completed DKG run: the aggregated group public key and every
/// slot's secret share.
pub struct GroupKeyMaterial {
    pub group_pk: RistrettoPoint,
    pub shares: Vec<SecretShare>,
    pub n: u8,
    pub t: u8,
}

/// Wire-format encoding of one slot's share, for the caller-owned persistence
/// spec §6 requires ("DKG output... MUST survive restarts via the adapter
/// they come through"). Holds compressed point/scalar bytes rather than the
/// `curve25519-dalek` types themselves, so the on-disk shape never depends on
/// that crate's own (de)serialization support.
#[derive(Clone, Serialize, Deserialize)]
pub struct PersistedShare {
    pub slot: u8,
    pub secret: [u8; 32],
    pub public: [u8; 32],
}

/// Wire-format encoding of a full `GroupKeyMaterial`.
#[derive(Clone, Serialize, Deserialize)]
pub struct PersistedKeyMaterial {
    pub group_pk: [u8; 32],
    pub shares: Vec<PersistedShare>,
    pub n: u8,
    pub t: u8,
}

impl GroupKeyMaterial {
    /// Encodes this key material for persistence. The secret scalars are
    /// still sensitive once encoded; the caller's persistence adapter is
    /// responsible for storing them safely (spec §6 scopes this core to
    /// producing the bytes, not to key custody).
    pub fn to_persisted(&self) -> PersistedKeyMaterial {
        PersistedKeyMaterial {
            group_pk: self.group_pk.compress().to_bytes(),
            shares: self
                .shares
                .iter()
                .map(|s| PersistedShare {
                    slot: s.slot,
                    secret: s.secret.to_bytes(),
                    public: s.public.compress().to_bytes(),
                })
                .collect(),
            n: self.n,
            t: self.t,
        }
    }
}

impl PersistedKeyMaterial {
    /// Decodes previously-persisted key material back into usable group
    /// elements and scalars, rejecting anything that doesn't decode to a
    /// canonical point or scalar.
    pub fn into_material(self) -> Result<GroupKeyMaterial, ThresholdError> {
        let group_pk = CompressedRistretto(self.group_pk)
            .decompress()
            .ok_or(ThresholdError::MalformedPersistedMaterial)?;
        let mut shares = Vec::with_capacity(self.shares.len());
        for share in self.shares {
            let secret: Option<Scalar> = Scalar::from_canonical_bytes(share.secret).into();
            let secret = secret.ok_or(ThresholdError::MalformedPersistedMaterial)?;
            let public = CompressedRistretto(share.public)
                .decompress()
                .ok_or(ThresholdError::MalformedPersistedMaterial)?;
            shares.push(SecretShare {
                slot: share.slot,
                secret,
                public,
            });
        }
        Ok(GroupKeyMaterial {
            group_pk,
            shares,
            n: self.n,
            t: self.t,
        })
    }
}

/// Evaluates a polynomial (lowest-degree coefficient first) at `x`, Horner's
/// method in the scalar field.
fn evaluate_polynomial(coefficients: &[Scalar], x: Scalar) -> Scalar {
    let mut acc = Scalar::from(0u64);
    for coeff in coefficients.iter().rev() {
        acc = acc * x + coeff;
    }
    acc
}

/// `dkg(n, t) -> {group_pk, shares[0..n-1]}`. Each slot `p` samples a degree
/// `t-1` polynomial, publishes `G * coefficients` (the "polynomial commitment"
/// of spec §4.2), and every other slot's share is the sum, over all
/// contributing slots, of that slot's polynomial evaluated at the receiver's
/// index. The group public key is the sum of every contributor's constant-term
/// commitment, i.e. the constant term of the summed polynomial.
pub fn dkg(n: u8, t: u8) -> Result<GroupKeyMaterial, ThresholdError> {
    if n == 0 || t == 0 || t > n {
        return Err(ThresholdError::InvalidDkgParameters { n, t });
    }
    let mut rng = OsRng;

    // Each of the n slots' private degree-(t-1) polynomials, coefficients[0] first.
    let mut polynomials: Vec<Vec<Scalar>> = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let coefficients: Vec<Scalar> = (0..t).map(|_| Scalar::random(&mut rng)).collect();
        polynomials.push(coefficients);
    }

    // Group public key: sum of each contributor's constant-term commitment.
    let group_pk: RistrettoPoint = polynomials
        .iter()
        .map(|poly| &RISTRETTO_BASEPOINT_TABLE * &poly[0])
        .sum();

    // Slot indices are 1-based in the polynomial evaluation (x=0 is reserved
    // for the secret itself), matching the FROST convention in the corpus.
    let mut shares = Vec::with_capacity(n as usize);
    for slot in 0..n {
        let x = Scalar::from((slot as u64) + 1);
        let secret: Scalar = polynomials
            .iter()
            .map(|poly| evaluate_polynomial(poly, x))
            .fold(Scalar::from(0u64), |acc, v| acc + v);
        let public = &RISTRETTO_BASEPOINT_TABLE * &secret;
        shares.push(SecretShare { slot, secret, public });
    }

    info!("dkg complete: n={n} t={t}");
    Ok(GroupKeyMaterial {
        group_pk,
        shares,
        n,
        t,
    })
}
