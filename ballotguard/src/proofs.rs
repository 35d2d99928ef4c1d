use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;

/// Schnorr proof of possession for an announced election public key.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchnorrProof {
    pub commitment: RistrettoPoint,
    pub challenge: Scalar,
    pub response: Scalar,
}

impl SchnorrProof {
    pub fn prove(secret: &Scalar, public: &RistrettoPoint) -> Self {
        let g = generator();
        let u = random_scalar();
        let commitment = g * u;
        let challenge = challenge(b"ballotguard::schnorr", &[&g, public, &commitment]);
        let response = u + challenge * secret;

        SchnorrProof {
            commitment,
            challenge,
            response,
        }
    }

    pub fn verify(&self, public: &RistrettoPoint) -> bool {
        let g = generator();
        let expected = challenge(b"ballotguard::schnorr", &[&g, public, &self.commitment]);
        if self.challenge != expected {
            return false;
        }
        g * self.response == self.commitment + public * self.challenge
    }
}

/// Chaum-Pedersen proof that a partial decryption is correct.
///
/// Proves knowledge of `x` such that `verification_key = x·G` and
/// `share = x·pad`, i.e. the guardian applied the same secret share it
/// committed to during the ceremony.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaumPedersenProof {
    pub pad_commitment: RistrettoPoint,
    pub data_commitment: RistrettoPoint,
    pub challenge: Scalar,
    pub response: Scalar,
}

impl ChaumPedersenProof {
    pub fn prove(
        share_secret: &Scalar,
        pad: &RistrettoPoint,
        verification_key: &RistrettoPoint,
        share: &RistrettoPoint,
    ) -> Self {
        let g = generator();
        let u = random_scalar();
        let pad_commitment = g * u;
        let data_commitment = pad * u;
        let challenge = challenge(
            b"ballotguard::chaum_pedersen",
            &[
                &g,
                pad,
                verification_key,
                share,
                &pad_commitment,
                &data_commitment,
            ],
        );
        let response = u + challenge * share_secret;

        ChaumPedersenProof {
            pad_commitment,
            data_commitment,
            challenge,
            response,
        }
    }

    pub fn verify(
        &self,
        pad: &RistrettoPoint,
        verification_key: &RistrettoPoint,
        share: &RistrettoPoint,
    ) -> bool {
        let g = generator();
        let expected = challenge(
            b"ballotguard::chaum_pedersen",
            &[
                &g,
                pad,
                verification_key,
                share,
                &self.pad_commitment,
                &self.data_commitment,
            ],
        );
        if self.challenge != expected {
            return false;
        }
        g * self.response == self.pad_commitment + verification_key * self.challenge
            && pad * self.response == self.data_commitment + share * self.challenge
    }
}

/// Disjunctive Chaum-Pedersen proof that a ciphertext encrypts zero or
/// one, without revealing which. The real branch is proven honestly and
/// the other branch is simulated with a preselected challenge; the
/// verifier only learns that the two challenges sum to the Fiat-Shamir
/// hash.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisjunctiveProof {
    pub zero_pad: RistrettoPoint,
    pub zero_data: RistrettoPoint,
    pub one_pad: RistrettoPoint,
    pub one_data: RistrettoPoint,
    pub zero_challenge: Scalar,
    pub one_challenge: Scalar,
    pub zero_response: Scalar,
    pub one_response: Scalar,
}

impl DisjunctiveProof {
    pub fn prove(
        message: &Ciphertext,
        vote: u64,
        nonce: &Scalar,
        public_key: &RistrettoPoint,
    ) -> Self {
        debug_assert!(vote <= 1);
        let g = generator();

        if vote == 0 {
            // Real proof on the zero branch, simulate the one branch.
            let u = random_scalar();
            let zero_pad = g * u;
            let zero_data = public_key * u;

            let one_challenge = random_scalar();
            let one_response = random_scalar();
            let one_pad = g * one_response - message.pad * one_challenge;
            let one_data =
                public_key * one_response - (message.data - g) * one_challenge;

            let combined = Self::combined_challenge(
                message, public_key, &zero_pad, &zero_data, &one_pad, &one_data,
            );
            let zero_challenge = combined - one_challenge;
            let zero_response = u + zero_challenge * nonce;

            DisjunctiveProof {
                zero_pad,
                zero_data,
                one_pad,
                one_data,
                zero_challenge,
                one_challenge,
                zero_response,
                one_response,
            }
        } else {
            // Real proof on the one branch, simulate the zero branch.
            let u = random_scalar();
            let one_pad = g * u;
            let one_data = public_key * u;

            let zero_challenge = random_scalar();
            let zero_response = random_scalar();
            let zero_pad = g * zero_response - message.pad * zero_challenge;
            let zero_data = public_key * zero_response - message.data * zero_challenge;

            let combined = Self::combined_challenge(
                message, public_key, &zero_pad, &zero_data, &one_pad, &one_data,
            );
            let one_challenge = combined - zero_challenge;
            let one_response = u + one_challenge * nonce;

            DisjunctiveProof {
                zero_pad,
                zero_data,
                one_pad,
                one_data,
                zero_challenge,
                one_challenge,
                zero_response,
                one_response,
            }
        }
    }

    pub fn verify(&self, message: &Ciphertext, public_key: &RistrettoPoint) -> bool {
        let g = generator();

        let combined = Self::combined_challenge(
            message,
            public_key,
            &self.zero_pad,
            &self.zero_data,
            &self.one_pad,
            &self.one_data,
        );
        if self.zero_challenge + self.one_challenge != combined {
            return false;
        }

        // Zero branch: (pad, data) is a DH pair.
        let zero_ok = g * self.zero_response
            == self.zero_pad + message.pad * self.zero_challenge
            && public_key * self.zero_response
                == self.zero_data + message.data * self.zero_challenge;

        // One branch: (pad, data - G) is a DH pair.
        let one_ok = g * self.one_response == self.one_pad + message.pad * self.one_challenge
            && public_key * self.one_response
                == self.one_data + (message.data - g) * self.one_challenge;

        zero_ok && one_ok
    }

    fn combined_challenge(
        message: &Ciphertext,
        public_key: &RistrettoPoint,
        zero_pad: &RistrettoPoint,
        zero_data: &RistrettoPoint,
        one_pad: &RistrettoPoint,
        one_data: &RistrettoPoint,
    ) -> Scalar {
        challenge(
            b"ballotguard::disjunctive",
            &[
                public_key,
                &message.pad,
                &message.data,
                zero_pad,
                zero_data,
                one_pad,
                one_data,
            ],
        )
    }
}

/// Chaum-Pedersen proof that a ciphertext encrypts a stated constant.
/// Used on the homomorphic sum of a contest's selections so the claimed
/// vote total can be checked against the contest's selection limit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantProof {
    pub pad_commitment: RistrettoPoint,
    pub data_commitment: RistrettoPoint,
    pub challenge: Scalar,
    pub response: Scalar,
    pub constant: u64,
}

impl ConstantProof {
    pub fn prove(
        message: &Ciphertext,
        constant: u64,
        nonce: &Scalar,
        public_key: &RistrettoPoint,
    ) -> Self {
        let g = generator();
        let u = random_scalar();
        let pad_commitment = g * u;
        let data_commitment = public_key * u;
        let challenge = Self::constant_challenge(
            message,
            constant,
            public_key,
            &pad_commitment,
            &data_commitment,
        );
        let response = u + challenge * nonce;

        ConstantProof {
            pad_commitment,
            data_commitment,
            challenge,
            response,
            constant,
        }
    }

    pub fn verify(&self, message: &Ciphertext, public_key: &RistrettoPoint) -> bool {
        let g = generator();
        let expected = Self::constant_challenge(
            message,
            self.constant,
            public_key,
            &self.pad_commitment,
            &self.data_commitment,
        );
        if self.challenge != expected {
            return false;
        }

        let offset = message.data - g * Scalar::from(self.constant);
        g * self.response == self.pad_commitment + message.pad * self.challenge
            && public_key * self.response == self.data_commitment + offset * self.challenge
    }

    fn constant_challenge(
        message: &Ciphertext,
        constant: u64,
        public_key: &RistrettoPoint,
        pad_commitment: &RistrettoPoint,
        data_commitment: &RistrettoPoint,
    ) -> Scalar {
        let constant_point = generator() * Scalar::from(constant);
        challenge(
            b"ballotguard::constant",
            &[
                public_key,
                &message.pad,
                &message.data,
                &constant_point,
                pad_commitment,
                data_commitment,
            ],
        )
    }
}
