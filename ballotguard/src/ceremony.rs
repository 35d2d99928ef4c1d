use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use log::info;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// How many guardians take part in the ceremony and how many must
/// cooperate to decrypt. Immutable once set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CeremonyDetails {
    pub number_of_guardians: u32,
    pub quorum: u32,
}

impl CeremonyDetails {
    pub fn new(number_of_guardians: u32, quorum: u32) -> Result<Self, Error> {
        if quorum < 1 || number_of_guardians < quorum {
            return Err(Error::InvalidCeremonyDetails {
                number_of_guardians,
                quorum,
            });
        }
        Ok(CeremonyDetails {
            number_of_guardians,
            quorum,
        })
    }
}

/// The ceremony's phases, strictly ordered. No skipping, no re-entry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyPhase {
    Announce,
    BackupExchange,
    Verification,
    Published,
}

impl std::fmt::Display for CeremonyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            CeremonyPhase::Announce => "Announce",
            CeremonyPhase::BackupExchange => "BackupExchange",
            CeremonyPhase::Verification => "Verification",
            CeremonyPhase::Published => "Published",
        };
        write!(f, "{}", name)
    }
}

/// The election-wide encryption key produced by a completed ceremony.
///
/// `share_verification_keys` are the public images of each guardian's
/// full decryption share. They can only be computed while every
/// guardian's coefficient commitments are at hand, which is why the
/// mediator derives them at publication time: the decryption mediator
/// must be able to check shares even when only a quorum announces.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ElectionJointKey {
    pub joint_public_key: RistrettoPoint,
    pub commitment_hash: [u8; 32],
    pub share_verification_keys: BTreeMap<u32, RistrettoPoint>,
}

/// Drives the key ceremony among exactly N guardians.
///
/// The mediator only ever sees public key sets, encrypted backups and
/// verification verdicts; guardian secrets stay behind the `Guardian`
/// boundary.
pub struct KeyCeremonyMediator {
    pub id: String,
    details: CeremonyDetails,
    phase: CeremonyPhase,
    announced: BTreeMap<u32, GuardianPublicKeySet>,
    backups: Vec<PartialKeyBackup>,
    backup_submissions: BTreeSet<u32>,
    verifications: BTreeMap<(u32, u32), PartialKeyVerification>,
}

impl KeyCeremonyMediator {
    pub fn new(id: impl Into<String>, details: CeremonyDetails) -> Self {
        KeyCeremonyMediator {
            id: id.into(),
            details,
            phase: CeremonyPhase::Announce,
            announced: BTreeMap::new(),
            backups: Vec::new(),
            backup_submissions: BTreeSet::new(),
            verifications: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> CeremonyPhase {
        self.phase
    }

    /// Record one guardian's announced public keys. Advances to the
    /// backup-exchange phase once all N guardians have announced.
    pub fn announce(&mut self, keys: GuardianPublicKeySet) -> Result<(), Error> {
        self.require_phase(CeremonyPhase::Announce)?;

        if keys.sequence < 1 || keys.sequence > self.details.number_of_guardians {
            return Err(Error::GuardianOutOfRange(keys.sequence));
        }
        if self.announced.contains_key(&keys.sequence) {
            return Err(Error::DuplicateGuardian(keys.sequence));
        }
        if keys.coefficient_commitments.len() as u32 != self.details.quorum {
            return Err(Error::InvalidKeyProof(keys.owner_id));
        }
        if !keys.proof.verify(keys.election_public_key()) {
            return Err(Error::InvalidKeyProof(keys.owner_id));
        }

        self.announced.insert(keys.sequence, keys);
        if self.announced.len() as u32 == self.details.number_of_guardians {
            info!("key ceremony {}: all guardians announced", self.id);
            self.phase = CeremonyPhase::BackupExchange;
        }
        Ok(())
    }

    /// The other guardians' announced keys, for one guardian to save.
    pub fn share_announced(
        &self,
        except_sequence: u32,
    ) -> Result<Vec<GuardianPublicKeySet>, Error> {
        if self.phase == CeremonyPhase::Announce {
            return Err(Error::CeremonyOutOfPhase {
                expected: CeremonyPhase::BackupExchange,
                actual: self.phase,
            });
        }
        Ok(self
            .announced
            .values()
            .filter(|k| k.sequence != except_sequence)
            .cloned()
            .collect())
    }

    /// Record one guardian's issued backups (one per peer). Advances to
    /// the verification phase once all N guardians have submitted; with
    /// N = 1 the submission is empty but still required.
    pub fn receive_backups(
        &mut self,
        owner_sequence: u32,
        backups: Vec<PartialKeyBackup>,
    ) -> Result<(), Error> {
        self.require_phase(CeremonyPhase::BackupExchange)?;

        if owner_sequence < 1 || owner_sequence > self.details.number_of_guardians {
            return Err(Error::GuardianOutOfRange(owner_sequence));
        }
        if backups.len() as u32 != self.details.number_of_guardians - 1 {
            return Err(Error::WrongNumberOfBackups {
                owner: owner_sequence,
                expected: self.details.number_of_guardians - 1,
                found: backups.len() as u32,
            });
        }
        for backup in &backups {
            if backup.owner_sequence != owner_sequence {
                return Err(Error::UnknownGuardian(backup.owner_sequence));
            }
        }

        self.backups.extend(backups);
        self.backup_submissions.insert(owner_sequence);
        if self.backup_submissions.len() as u32 == self.details.number_of_guardians {
            info!("key ceremony {}: all backups exchanged", self.id);
            self.phase = CeremonyPhase::Verification;
        }
        Ok(())
    }

    /// The backups addressed to one guardian, in owner order.
    pub fn share_backups(
        &self,
        designated_sequence: u32,
    ) -> Result<Vec<PartialKeyBackup>, Error> {
        self.require_phase(CeremonyPhase::Verification)?;
        let mut backups: Vec<PartialKeyBackup> = self
            .backups
            .iter()
            .filter(|b| b.designated_sequence == designated_sequence)
            .cloned()
            .collect();
        backups.sort_by_key(|b| b.owner_sequence);
        Ok(backups)
    }

    pub fn receive_backup_verifications(
        &mut self,
        verifications: Vec<PartialKeyVerification>,
    ) -> Result<(), Error> {
        self.require_phase(CeremonyPhase::Verification)?;
        for verification in verifications {
            self.verifications.insert(
                (verification.verifier_sequence, verification.owner_sequence),
                verification,
            );
        }
        Ok(())
    }

    /// Compute the joint key once every backup has been verified.
    ///
    /// A missing or failed verification blocks publication; a failure is
    /// surfaced with the exact (verifier, subject) pair so the operator
    /// knows which exchange went wrong. Not retried automatically.
    pub fn publish_joint_key(&mut self) -> Result<ElectionJointKey, Error> {
        self.require_phase(CeremonyPhase::Verification)?;

        for verifier in 1..=self.details.number_of_guardians {
            for owner in 1..=self.details.number_of_guardians {
                if verifier == owner {
                    continue;
                }
                match self.verifications.get(&(verifier, owner)) {
                    None => {
                        return Err(Error::CeremonyIncomplete(
                            "missing backup verifications",
                        ))
                    }
                    Some(verification) if !verification.verified => {
                        return Err(Error::CeremonyVerificationFailed {
                            verifier: verification.verifier_id.clone(),
                            subject: verification.owner_id.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let mut joint_public_key = identity();
        let mut hasher = Sha256::new();
        hasher.update(b"ballotguard::commitments");
        for keys in self.announced.values() {
            joint_public_key += keys.election_public_key();
            hasher.update(keys.sequence.to_be_bytes());
            for commitment in &keys.coefficient_commitments {
                hasher.update(commitment.compress().to_bytes());
            }
        }
        let mut commitment_hash = [0u8; 32];
        commitment_hash.copy_from_slice(&hasher.finalize()[..32]);

        // Public image of each guardian's full decryption share: the sum
        // of every polynomial evaluated (in the exponent) at its index.
        let mut share_verification_keys = BTreeMap::new();
        for sequence in 1..=self.details.number_of_guardians {
            let mut key = identity();
            for keys in self.announced.values() {
                key += eval_commitments(&keys.coefficient_commitments, sequence);
            }
            share_verification_keys.insert(sequence, key);
        }

        self.phase = CeremonyPhase::Published;
        info!("key ceremony {}: joint key published", self.id);

        Ok(ElectionJointKey {
            joint_public_key,
            commitment_hash,
            share_verification_keys,
        })
    }

    fn require_phase(&self, expected: CeremonyPhase) -> Result<(), Error> {
        if self.phase != expected {
            return Err(Error::CeremonyOutOfPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceremony_details() {
        assert!(CeremonyDetails::new(3, 2).is_ok());
        assert!(CeremonyDetails::new(1, 1).is_ok());
        assert!(matches!(
            CeremonyDetails::new(2, 3),
            Err(Error::InvalidCeremonyDetails { .. })
        ));
        assert!(matches!(
            CeremonyDetails::new(2, 0),
            Err(Error::InvalidCeremonyDetails { .. })
        ));
    }

    #[test]
    fn test_phases_are_strictly_ordered() {
        let details = CeremonyDetails::new(2, 2).unwrap();
        let mut mediator = KeyCeremonyMediator::new("ceremony", details);
        let guardian = Guardian::new("guardian-1", 1, details);

        // Backups cannot be submitted before all announcements are in.
        assert!(matches!(
            mediator.receive_backups(1, vec![]),
            Err(Error::CeremonyOutOfPhase { .. })
        ));

        mediator.announce(guardian.share_public_keys()).unwrap();
        assert_eq!(mediator.phase(), CeremonyPhase::Announce);

        // The same guardian cannot announce twice.
        assert!(matches!(
            mediator.announce(guardian.share_public_keys()),
            Err(Error::DuplicateGuardian(1))
        ));

        // Publication requires the verification phase.
        assert!(matches!(
            mediator.publish_joint_key(),
            Err(Error::CeremonyOutOfPhase { .. })
        ));
    }

    #[test]
    fn test_single_guardian_ceremony() {
        let details = CeremonyDetails::new(1, 1).unwrap();
        let mut mediator = KeyCeremonyMediator::new("ceremony", details);
        let guardian = Guardian::new("guardian-1", 1, details);

        mediator.announce(guardian.share_public_keys()).unwrap();
        assert_eq!(mediator.phase(), CeremonyPhase::BackupExchange);

        // The backup exchange and verification phases are vacuous but
        // must still execute without error.
        mediator.receive_backups(1, vec![]).unwrap();
        assert_eq!(mediator.phase(), CeremonyPhase::Verification);
        assert!(mediator.share_backups(1).unwrap().is_empty());
        mediator.receive_backup_verifications(vec![]).unwrap();

        let joint_key = mediator.publish_joint_key().unwrap();
        assert_eq!(
            &joint_key.joint_public_key,
            guardian.share_public_keys().election_public_key()
        );
        assert_eq!(mediator.phase(), CeremonyPhase::Published);

        // No re-entry once published.
        assert!(matches!(
            mediator.publish_joint_key(),
            Err(Error::CeremonyOutOfPhase { .. })
        ));
    }
}
