use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use hkdf::Hkdf;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;

/// A guardian's secret polynomial of degree `quorum - 1`.
///
/// The constant term is the guardian's election secret key; evaluations at
/// the other guardians' sequence indices become the partial key backups.
/// Any `quorum` evaluations reconstruct the constant term.
#[derive(Clone)]
pub struct SecretPolynomial {
    coefficients: Vec<Scalar>,
}

impl SecretPolynomial {
    /// Derive the polynomial deterministically from 32 bytes of key
    /// material via HKDF into a seeded ChaCha20 stream.
    pub fn generate(seed: &[u8; 32], quorum: u32) -> Self {
        let h = Hkdf::<Sha256>::new(None, seed);
        let mut okm = [0u8; 32];
        h.expand(b"ballotguard_guardian_polynomial", &mut okm)
            .unwrap();

        let mut rng = ChaCha20Rng::from_seed(okm);
        let mut coefficients = Vec::with_capacity(quorum as usize);
        for _ in 0..quorum {
            let mut wide = [0u8; 64];
            rng.fill_bytes(&mut wide);
            coefficients.push(Scalar::from_bytes_mod_order_wide(&wide));
        }

        SecretPolynomial { coefficients }
    }

    /// The guardian's election secret key.
    pub fn constant_term(&self) -> &Scalar {
        &self.coefficients[0]
    }

    pub fn eval(&self, sequence: u32) -> Scalar {
        let x = Scalar::from(sequence as u64);
        let mut pow = Scalar::ONE;
        let mut acc = Scalar::ZERO;
        for c in &self.coefficients {
            acc += c * pow;
            pow *= x;
        }
        acc
    }

    /// Public commitments `c_k·G` to every coefficient, published during
    /// the Announce phase so peers can verify their backups.
    pub fn commitments(&self) -> Vec<RistrettoPoint> {
        let g = generator();
        self.coefficients.iter().map(|c| g * c).collect()
    }
}

/// Evaluate a commitment vector "in the exponent": the expected public
/// image of `polynomial.eval(sequence)`.
pub fn eval_commitments(commitments: &[RistrettoPoint], sequence: u32) -> RistrettoPoint {
    let x = Scalar::from(sequence as u64);
    let mut pow = Scalar::ONE;
    let mut acc = identity();
    for commitment in commitments {
        acc += commitment * pow;
        pow *= x;
    }
    acc
}

/// Lagrange coefficient at zero for guardian `i` among the `present`
/// sequence indices.
pub fn lagrange_coefficient(i: u32, present: &[u32]) -> Scalar {
    let i_s = Scalar::from(i as u64);
    let mut num = Scalar::ONE;
    let mut den = Scalar::ONE;
    for &k in present {
        if k == i {
            continue;
        }
        let k_s = Scalar::from(k as u64);
        num *= k_s;
        den *= k_s - i_s;
    }
    num * den.invert()
}
