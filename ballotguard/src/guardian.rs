use crate::ecies;
use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use indexmap::IndexMap;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::BTreeMap;

/// A guardian holds one share of the election's decryption capability.
///
/// The secret polynomial never leaves this struct. Everything a guardian
/// exchanges with its peers travels through explicit message values
/// (`GuardianPublicKeySet`, `PartialKeyBackup`, `PartialKeyVerification`,
/// `DecryptionShare`), so a deployment can put each guardian in its own
/// process without changing the protocol logic.
pub struct Guardian {
    pub id: String,
    pub sequence: u32,
    details: CeremonyDetails,
    polynomial: SecretPolynomial,
    commitments: Vec<RistrettoPoint>,
    auxiliary_secret: Scalar,
    auxiliary_public: EciesPublicKey,
    peer_keys: BTreeMap<u32, GuardianPublicKeySet>,
    received_backups: BTreeMap<u32, PartialKeyBackup>,
    issued_backups: BTreeMap<u32, PartialKeyBackup>,
    /// Decrypted and verified backup coordinates, by owner sequence.
    peer_coordinates: BTreeMap<u32, Scalar>,
}

/// A guardian's announced public keys: coefficient commitments for its
/// secret polynomial, an auxiliary key for receiving encrypted backups,
/// and a proof of possession for the election key share.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GuardianPublicKeySet {
    pub owner_id: String,
    pub sequence: u32,
    pub coefficient_commitments: Vec<RistrettoPoint>,
    pub auxiliary_public_key: EciesPublicKey,
    pub proof: SchnorrProof,
}

impl GuardianPublicKeySet {
    /// The guardian's election public key share (the constant-term
    /// commitment).
    pub fn election_public_key(&self) -> &RistrettoPoint {
        &self.coefficient_commitments[0]
    }
}

/// An encrypted evaluation of the owner's secret polynomial at the
/// designated guardian's sequence index. Any `quorum` of these
/// reconstruct the owner's secret.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PartialKeyBackup {
    pub owner_id: String,
    pub owner_sequence: u32,
    pub designated_id: String,
    pub designated_sequence: u32,
    #[serde(with = "hex::serde")]
    pub encrypted_coordinate: Vec<u8>,
}

/// The outcome of one guardian checking one backup it received.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PartialKeyVerification {
    pub owner_id: String,
    pub owner_sequence: u32,
    pub verifier_id: String,
    pub verifier_sequence: u32,
    pub verified: bool,
}

impl Guardian {
    pub fn new(id: impl Into<String>, sequence: u32, details: CeremonyDetails) -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);

        let polynomial = SecretPolynomial::generate(&seed, details.quorum);
        let commitments = polynomial.commitments();
        let (auxiliary_secret, auxiliary_public) = generate_keypair();

        Guardian {
            id: id.into(),
            sequence,
            details,
            polynomial,
            commitments,
            auxiliary_secret,
            auxiliary_public,
            peer_keys: BTreeMap::new(),
            received_backups: BTreeMap::new(),
            issued_backups: BTreeMap::new(),
            peer_coordinates: BTreeMap::new(),
        }
    }

    pub fn share_public_keys(&self) -> GuardianPublicKeySet {
        GuardianPublicKeySet {
            owner_id: self.id.clone(),
            sequence: self.sequence,
            coefficient_commitments: self.commitments.clone(),
            auxiliary_public_key: self.auxiliary_public,
            proof: SchnorrProof::prove(self.polynomial.constant_term(), &self.commitments[0]),
        }
    }

    pub fn save_guardian_public_keys(&mut self, keys: GuardianPublicKeySet) {
        if keys.sequence != self.sequence {
            self.peer_keys.insert(keys.sequence, keys);
        }
    }

    /// Compute one backup per peer: the polynomial evaluated at the
    /// peer's sequence index, sealed to the peer's auxiliary key.
    pub fn generate_partial_key_backups(&mut self) -> Result<Vec<PartialKeyBackup>, Error> {
        self.require_all_peer_keys()?;

        let mut backups = Vec::with_capacity(self.peer_keys.len());
        for peer in self.peer_keys.values() {
            let coordinate = self.polynomial.eval(peer.sequence);
            let encrypted_coordinate =
                ecies::encrypt(&peer.auxiliary_public_key, &coordinate.to_bytes());

            let backup = PartialKeyBackup {
                owner_id: self.id.clone(),
                owner_sequence: self.sequence,
                designated_id: peer.owner_id.clone(),
                designated_sequence: peer.sequence,
                encrypted_coordinate,
            };
            self.issued_backups
                .insert(peer.sequence, backup.clone());
            backups.push(backup);
        }

        Ok(backups)
    }

    pub fn save_partial_key_backup(&mut self, backup: PartialKeyBackup) {
        self.received_backups.insert(backup.owner_sequence, backup);
    }

    /// Decrypt a received backup and check it against the owner's
    /// published coefficient commitments. A backup that fails to decrypt
    /// or does not match reports `verified: false` rather than an error;
    /// the ceremony mediator turns that into a fatal, attributable
    /// failure at publication time.
    pub fn verify_partial_key_backup(
        &mut self,
        owner_sequence: u32,
    ) -> Result<PartialKeyVerification, Error> {
        let backup = self
            .received_backups
            .get(&owner_sequence)
            .ok_or(Error::UnknownGuardian(owner_sequence))?;
        let owner_keys = self
            .peer_keys
            .get(&owner_sequence)
            .ok_or_else(|| Error::MissingGuardianKeys(self.id.clone()))?;

        let coordinate = ecies::decrypt(&self.auxiliary_secret, &backup.encrypted_coordinate)
            .and_then(|bytes| {
                let buf: [u8; 32] = bytes.try_into().ok()?;
                Option::<Scalar>::from(Scalar::from_canonical_bytes(buf))
            });

        let verified = match coordinate {
            Some(coordinate) => {
                let expected =
                    eval_commitments(&owner_keys.coefficient_commitments, self.sequence);
                if generator() * coordinate == expected {
                    self.peer_coordinates.insert(owner_sequence, coordinate);
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        Ok(PartialKeyVerification {
            owner_id: backup.owner_id.clone(),
            owner_sequence,
            verifier_id: self.id.clone(),
            verifier_sequence: self.sequence,
            verified,
        })
    }

    /// The guardian's full decryption share key: its own polynomial
    /// evaluated at its index plus every verified peer coordinate.
    fn share_key(&self) -> Result<Scalar, Error> {
        if self.peer_coordinates.len() as u32 != self.details.number_of_guardians - 1 {
            return Err(Error::MissingGuardianKeys(self.id.clone()));
        }

        let mut key = self.polynomial.eval(self.sequence);
        for coordinate in self.peer_coordinates.values() {
            key += coordinate;
        }
        Ok(key)
    }

    /// Partial decryption of every selection in the aggregated tally,
    /// with a proof of correctness per ciphertext.
    pub fn compute_tally_share(&self, tally: &CiphertextTally) -> Result<DecryptionShare, Error> {
        let share_key = self.share_key()?;
        let verification_key = generator() * share_key;

        let mut contests = IndexMap::new();
        for (contest_id, contest) in &tally.contests {
            let mut selections = IndexMap::new();
            for (selection_id, ciphertext) in &contest.selections {
                selections.insert(
                    selection_id.clone(),
                    Self::partial_decrypt(&share_key, &verification_key, ciphertext),
                );
            }
            contests.insert(contest_id.clone(), ContestShare { selections });
        }

        Ok(DecryptionShare {
            target_id: tally.object_id.clone(),
            guardian_id: self.id.clone(),
            sequence: self.sequence,
            contests,
        })
    }

    /// Partial decryptions for individual ballots, keyed by ballot id.
    pub fn compute_ballot_shares(
        &self,
        ballots: &[EncryptedBallot],
    ) -> Result<BTreeMap<String, DecryptionShare>, Error> {
        let share_key = self.share_key()?;
        let verification_key = generator() * share_key;

        let mut shares = BTreeMap::new();
        for ballot in ballots {
            let mut contests = IndexMap::new();
            for contest in &ballot.contests {
                let mut selections = IndexMap::new();
                for selection in &contest.selections {
                    selections.insert(
                        selection.object_id.clone(),
                        Self::partial_decrypt(&share_key, &verification_key, &selection.ciphertext),
                    );
                }
                contests.insert(contest.object_id.clone(), ContestShare { selections });
            }
            shares.insert(
                ballot.object_id.clone(),
                DecryptionShare {
                    target_id: ballot.object_id.clone(),
                    guardian_id: self.id.clone(),
                    sequence: self.sequence,
                    contests,
                },
            );
        }

        Ok(shares)
    }

    fn partial_decrypt(
        share_key: &Scalar,
        verification_key: &RistrettoPoint,
        ciphertext: &Ciphertext,
    ) -> SelectionShare {
        let share = ciphertext.pad * share_key;
        let proof =
            ChaumPedersenProof::prove(share_key, &ciphertext.pad, verification_key, &share);
        SelectionShare { share, proof }
    }

    fn require_all_peer_keys(&self) -> Result<(), Error> {
        for sequence in 1..=self.details.number_of_guardians {
            if sequence != self.sequence && !self.peer_keys.contains_key(&sequence) {
                return Err(Error::MissingGuardianKeys(self.id.clone()));
            }
        }
        Ok(())
    }
}
