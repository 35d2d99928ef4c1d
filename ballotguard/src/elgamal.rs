use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;

/// An exponential ElGamal ciphertext under the election joint key.
///
/// `pad = r·G` and `data = m·G + r·K` where `K` is the joint public key.
/// Two ciphertexts can be accumulated; the sum encrypts the sum of the
/// plaintexts, which is what makes the homomorphic tally work.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ciphertext {
    pub pad: RistrettoPoint,
    pub data: RistrettoPoint,
}

impl Ciphertext {
    /// The additive identity: accumulating onto it leaves the other
    /// ciphertext unchanged.
    pub fn zero() -> Self {
        Ciphertext {
            pad: identity(),
            data: identity(),
        }
    }

    pub fn encrypt(vote: u64, nonce: &Scalar, public_key: &RistrettoPoint) -> Self {
        let g = generator();
        Ciphertext {
            pad: g * nonce,
            data: g * Scalar::from(vote) + public_key * nonce,
        }
    }

    pub fn accumulate(&mut self, other: &Ciphertext) {
        self.pad += other.pad;
        self.data += other.data;
    }

    /// Decrypt given the combined decryption value `M = s·pad`, where `s`
    /// is the joint secret no single party holds. Returns `None` if the
    /// decoded plaintext exceeds `max`.
    pub fn decrypt_with_shares(&self, combined: &RistrettoPoint, max: u64) -> Option<u64> {
        discrete_log(&(self.data - combined), max)
    }

    /// Feed this ciphertext into a running hash.
    pub fn hash_into(&self, hasher: &mut sha2::Sha256) {
        use sha2::Digest;
        hasher.update(self.pad.compress().to_bytes());
        hasher.update(self.data.compress().to_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let secret = random_scalar();
        let public = generator() * secret;

        let nonce = random_scalar();
        let message = Ciphertext::encrypt(1, &nonce, &public);

        let combined = message.pad * secret;
        assert_eq!(message.decrypt_with_shares(&combined, 1), Some(1));
    }

    #[test]
    fn test_homomorphic_accumulation() {
        let secret = random_scalar();
        let public = generator() * secret;

        let mut accumulated = Ciphertext::zero();
        for vote in [1u64, 0, 1, 1] {
            let message = Ciphertext::encrypt(vote, &random_scalar(), &public);
            accumulated.accumulate(&message);
        }

        let combined = accumulated.pad * secret;
        assert_eq!(accumulated.decrypt_with_shares(&combined, 4), Some(3));
    }
}
