use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};

/// The group generator used for all election keys and ciphertexts.
pub fn generator() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

pub fn identity() -> RistrettoPoint {
    RistrettoPoint::identity()
}

pub fn random_scalar() -> Scalar {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    Scalar::from_bytes_mod_order_wide(&bytes)
}

/// Domain-separated SHA-512, reduced to a scalar.
pub fn hash_to_scalar(domain: &[u8], data: &[u8]) -> Scalar {
    let mut h = Sha512::new();
    h.update(domain);
    h.update(data);
    let out = h.finalize();
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&out[..64]);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Fiat-Shamir challenge over a sequence of group elements.
pub fn challenge(domain: &[u8], points: &[&RistrettoPoint]) -> Scalar {
    let mut buf = Vec::with_capacity(points.len() * 32);
    for point in points {
        buf.extend_from_slice(&point.compress().to_bytes());
    }
    hash_to_scalar(domain, &buf)
}

/// Recover `m` from `m·G` by exhaustive search up to `max`.
///
/// Exponential ElGamal decodes to a group element; vote counts are small
/// enough that a linear scan is adequate.
pub fn discrete_log(target: &RistrettoPoint, max: u64) -> Option<u64> {
    let g = generator();
    let mut accumulator = RistrettoPoint::identity();
    for m in 0..=max {
        if accumulator == *target {
            return Some(m);
        }
        accumulator += g;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discrete_log() {
        let g = generator();
        assert_eq!(discrete_log(&(g * Scalar::from(0u64)), 10), Some(0));
        assert_eq!(discrete_log(&(g * Scalar::from(7u64)), 10), Some(7));
        assert_eq!(discrete_log(&(g * Scalar::from(11u64)), 10), None);
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let p = generator() * random_scalar();
        let q = generator() * random_scalar();

        assert_eq!(
            challenge(b"ballotguard-test", &[&p, &q]),
            challenge(b"ballotguard-test", &[&p, &q])
        );
        assert_ne!(
            challenge(b"ballotguard-test", &[&p, &q]),
            challenge(b"ballotguard-test", &[&q, &p])
        );
    }
}
