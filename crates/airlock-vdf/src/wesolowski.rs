//! Wesolowski proof math: repeated squaring modulo a fixed RSA-style modulus, a
//! Fiat-Shamir derived prime `l`, and the constant-time verification check
//! `pi^l * x^r ≡ y (mod N)`.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use sha2::{Digest, Sha256};

/// Fixed 2048-bit public modulus. No party is assumed to know its factorization;
/// in a real deployment this would be produced by a multi-party ceremony, out of
/// scope here (spec §1's RPC/key-management boundary).
pub fn modulus() -> BigUint {
    let hex = "a5f3c91e7b8d2640".repeat(32);
    let mut bytes = hex::decode(&hex).expect("fixed hex constant is valid");
    *bytes.last_mut().expect("non-empty") |= 1;
    BigUint::from_bytes_be(&bytes)
}

/// Result of the sequential-squaring proving pass.
#[derive(Clone, Debug)]
pub struct ProofOutput {
    pub y: BigUint,
    pub pi: BigUint,
}

/// Signal returned by the checkpoint callback every `checkpoint_every` squarings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointSignal {
    Continue,
    Bypass,
}

/// Runs the `T`-squaring evaluation, invoking `on_checkpoint` every
/// `checkpoint_every` iterations so the caller can report progress or request
/// bypass. Returns `Ok(None)` if bypassed mid-computation.
pub fn evaluate(
    x: &BigUint,
    t: u64,
    modulus: &BigUint,
    checkpoint_every: u64,
    mut on_checkpoint: impl FnMut(u64) -> CheckpointSignal,
) -> Option<BigUint> {
    let mut y = x.clone();
    for i in 0..t {
        y = (&y * &y) % modulus;
        let done = i + 1;
        if checkpoint_every > 0 && done % checkpoint_every == 0 {
            if on_checkpoint(done) == CheckpointSignal::Bypass {
                return None;
            }
        }
    }
    Some(y)
}

/// Computes the Wesolowski proof `pi = x^{floor(2^T / l)} mod N` via the standard
/// incremental-long-division recurrence (`r_0 = 1`, `r_{i+1} = 2 r_i mod l`,
/// `b_i = floor(2 r_i / l)`, `pi_{i+1} = pi_i^2 * x^{b_i} mod N`), so the proof is
/// produced in a second `T`-length sequential pass once `y` (and hence `l`) is
/// known.
pub fn prove(
    x: &BigUint,
    t: u64,
    l: &BigUint,
    modulus: &BigUint,
    checkpoint_every: u64,
    mut on_checkpoint: impl FnMut(u64) -> CheckpointSignal,
) -> Option<BigUint> {
    let two = BigUint::from(2u32);
    let mut pi = BigUint::one();
    let mut r = BigUint::one();
    for i in 0..t {
        let r2 = &r * &two;
        let b = &r2 / l;
        r = &r2 % l;
        pi = (pi.modpow(&two, modulus) * x.modpow(&b, modulus)) % modulus;
        let done = i + 1;
        if checkpoint_every > 0 && done % checkpoint_every == 0 {
            if on_checkpoint(done) == CheckpointSignal::Bypass {
                return None;
            }
        }
    }
    Some(pi)
}

/// Derives the Fiat-Shamir prime `l` from `(x, y)` by hashing and searching
/// forward for the next probable prime, as spec §4.1 requires.
pub fn hash_to_prime(x: &BigUint, y: &BigUint) -> BigUint {
    let mut seed = Vec::new();
    seed.extend(x.to_bytes_be());
    seed.extend(y.to_bytes_be());
    let mut counter: u64 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(&seed);
        hasher.update(counter.to_be_bytes());
        let digest = hasher.finalize();
        let mut candidate = BigUint::from_bytes_be(&digest);
        candidate |= BigUint::one();
        if is_probable_prime(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

const MILLER_RABIN_BASES: &[u32] = &[2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

fn is_probable_prime(n: &BigUint) -> bool {
    if *n < BigUint::from(2u32) {
        return false;
    }
    for &p in MILLER_RABIN_BASES {
        let bp = BigUint::from(p);
        if n == &bp {
            return true;
        }
        if (n % &bp).is_zero() {
            return false;
        }
    }
    let one = BigUint::one();
    let n_minus_1 = n - &one;
    let mut d = n_minus_1.clone();
    let mut r = 0u32;
    while (&d).is_even() {
        d >>= 1;
        r += 1;
    }
    'witness: for &a in MILLER_RABIN_BASES {
        let a = BigUint::from(a);
        if a >= *n {
            continue;
        }
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_1 {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = x.modpow(&BigUint::from(2u32), n);
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Stateless verification: `pi^l * x^r ≡ y (mod N)` where `r = 2^T mod l`.
pub fn verify(x: &BigUint, t: u64, modulus: &BigUint, y: &BigUint, pi: &BigUint) -> bool {
    let l = hash_to_prime(x, y);
    let t_big = BigUint::from(t);
    let r = BigUint::from(2u32).modpow(&t_big, &l);
    let lhs = (pi.modpow(&l, modulus) * x.modpow(&r, modulus)) % modulus;
    lhs == *y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_bypass(_: u64) -> CheckpointSignal {
        CheckpointSignal::Continue
    }

    #[test]
    fn small_t_round_trips() {
        let m = modulus();
        let x = BigUint::from(7u32);
        let t = 64u64;
        let y = evaluate(&x, t, &m, 0, no_bypass).expect("no bypass requested");
        let l = hash_to_prime(&x, &y);
        let pi = prove(&x, t, &l, &m, 0, no_bypass).expect("no bypass requested");
        assert!(verify(&x, t, &m, &y, &pi));
    }

    #[test]
    fn tampered_output_fails_verification() {
        let m = modulus();
        let x = BigUint::from(11u32);
        let t = 32u64;
        let y = evaluate(&x, t, &m, 0, no_bypass).unwrap();
        let l = hash_to_prime(&x, &y);
        let pi = prove(&x, t, &l, &m, 0, no_bypass).unwrap();
        let tampered_y = (&y + BigUint::one()) % &m;
        assert!(!verify(&x, t, &m, &tampered_y, &pi));
    }

    #[test]
    fn checkpoint_bypass_short_circuits_evaluation() {
        let m = modulus();
        let x = BigUint::from(3u32);
        let mut seen = 0u64;
        let result = evaluate(&x, 1000, &m, 16, |progress| {
            seen = progress;
            if progress >= 16 {
                CheckpointSignal::Bypass
            } else {
                CheckpointSignal::Continue
            }
        });
        assert!(result.is_none());
        assert_eq!(seen, 16);
    }

    #[test]
    fn hash_to_prime_is_deterministic_and_prime() {
        let a = BigUint::from(5u32);
        let b = BigUint::from(9u32);
        let l1 = hash_to_prime(&a, &b);
        let l2 = hash_to_prime(&a, &b);
        assert_eq!(l1, l2);
        assert!(is_probable_prime(&l1));
    }
}
