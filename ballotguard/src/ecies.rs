//! Integrated encryption for partial key backups.
//!
//! An ephemeral Diffie-Hellman exchange on the Ristretto group feeds
//! HKDF-SHA256 to derive an AES-256-GCM key. Each guardian publishes an
//! auxiliary public key during the Announce phase that exists only so its
//! peers can seal backups to it; it is never used for anything else.

use crate::*;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

const POINT_LENGTH: usize = 32;
const AES_IV_LENGTH: usize = 12;

type AesKey = [u8; 32];

/// A Ristretto public key meant for use in ECIES.
///
/// It should not be used for signing or in any protocol other than ECIES.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EciesPublicKey(RistrettoPoint);

impl EciesPublicKey {
    pub fn to_bytes(&self) -> [u8; POINT_LENGTH] {
        self.0.compress().to_bytes()
    }

    /// Will return None if the bytes are not a valid group element.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != POINT_LENGTH {
            return None;
        }
        let mut buf = [0u8; POINT_LENGTH];
        buf.copy_from_slice(bytes);
        CompressedRistretto(buf).decompress().map(EciesPublicKey)
    }

    pub fn from_secret(secret: &Scalar) -> Self {
        EciesPublicKey(generator() * secret)
    }

    pub fn as_point(&self) -> &RistrettoPoint {
        &self.0
    }
}

/// Generate a keypair, ready for use in ECIES.
pub fn generate_keypair() -> (Scalar, EciesPublicKey) {
    let secret = random_scalar();
    let public = EciesPublicKey::from_secret(&secret);
    (secret, public)
}

/// Encrypt a message so it can only be read with the receiver's secret.
pub fn encrypt(receiver_pub: &EciesPublicKey, msg: &[u8]) -> Vec<u8> {
    let (ephemeral_sk, ephemeral_pk) = generate_keypair();

    let aes_key = encapsulate(&ephemeral_sk, &ephemeral_pk, receiver_pub);
    let encrypted = aes_encrypt(&aes_key, msg);

    let mut cipher_text = Vec::with_capacity(POINT_LENGTH + encrypted.len());
    cipher_text.extend(ephemeral_pk.to_bytes());
    cipher_text.extend(encrypted);

    cipher_text
}

/// Decrypt an ECIES ciphertext using the receiver's secret. Returns None
/// on any malformed or tampered input.
pub fn decrypt(receiver_sec: &Scalar, msg: &[u8]) -> Option<Vec<u8>> {
    if msg.len() < POINT_LENGTH + AES_IV_LENGTH {
        return None;
    }

    let ephemeral_pk = EciesPublicKey::from_bytes(&msg[..POINT_LENGTH])?;
    let encrypted = &msg[POINT_LENGTH..];

    let shared = ephemeral_pk.as_point() * receiver_sec;
    let aes_key = derive_key(&ephemeral_pk, &shared);

    aes_decrypt(&aes_key, encrypted)
}

fn encapsulate(
    ephemeral_sk: &Scalar,
    ephemeral_pk: &EciesPublicKey,
    peer_pk: &EciesPublicKey,
) -> AesKey {
    let shared = peer_pk.as_point() * ephemeral_sk;
    derive_key(ephemeral_pk, &shared)
}

fn derive_key(ephemeral_pk: &EciesPublicKey, shared: &RistrettoPoint) -> AesKey {
    let mut master = Vec::with_capacity(POINT_LENGTH * 2);
    master.extend(ephemeral_pk.to_bytes());
    master.extend(shared.compress().to_bytes());

    let h = Hkdf::<Sha256>::new(None, &master);
    let mut out = [0u8; 32];
    h.expand(&[], &mut out).unwrap();
    out
}

fn aes_encrypt(key: &AesKey, msg: &[u8]) -> Vec<u8> {
    let aead = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce = [0u8; AES_IV_LENGTH];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = aead
        .encrypt(GenericArray::from_slice(&nonce), msg)
        .expect("ballotguard: ecies: encryption failure");

    let mut output = Vec::with_capacity(AES_IV_LENGTH + ciphertext.len());
    output.extend(nonce);
    output.extend(ciphertext);

    output
}

fn aes_decrypt(key: &AesKey, ciphertext: &[u8]) -> Option<Vec<u8>> {
    let aead = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let nonce = GenericArray::from_slice(&ciphertext[..AES_IV_LENGTH]);
    let encrypted = &ciphertext[AES_IV_LENGTH..];

    aead.decrypt(nonce, encrypted).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes() {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);

        let plaintext = b"a partial key backup";
        let encrypted = aes_encrypt(&key, plaintext);
        let decrypted = aes_decrypt(&key, &encrypted).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
    }

    #[test]
    fn test_ecies_round_trip() {
        let (peer_sk, peer_pk) = generate_keypair();

        let plaintext = b"a partial key backup";

        let encrypted = encrypt(&peer_pk, plaintext);
        let decrypted = decrypt(&peer_sk, &encrypted).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());

        // Decryption with the wrong secret key must fail.
        let (bad_sk, _) = generate_keypair();
        assert!(decrypt(&bad_sk, &encrypted).is_none());
    }
}
