use crate::*;
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub fn generate_device_uuid() -> Uuid {
    Uuid::new_v4()
}

/// The device or session performing ballot encryption. Its identity and
/// launch code seed the tracking code chain.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncryptionDevice {
    pub uuid: Uuid,
    pub launch_code: u64,
    pub location: String,
}

impl EncryptionDevice {
    pub fn new(uuid: Uuid, launch_code: u64, location: impl Into<String>) -> Self {
        EncryptionDevice {
            uuid,
            launch_code,
            location: location.into(),
        }
    }
}

/// Encrypts plaintext ballots under the election joint key.
///
/// Produces the ciphertexts, the vote-validity proofs and a tracking
/// code from a running hash chain: each code folds in the previous one,
/// so successive ballots form an unlinkable-but-verifiable sequence.
/// The mediator does not store ballots.
pub struct EncryptionMediator {
    context: Arc<ElectionContext>,
    pub device: EncryptionDevice,
    code_seed: [u8; 32],
}

impl EncryptionMediator {
    pub fn new(context: Arc<ElectionContext>, device: EncryptionDevice) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"ballotguard::device_seed");
        hasher.update(context.crypto_base_hash);
        hasher.update(device.uuid.as_bytes());
        hasher.update(device.launch_code.to_be_bytes());
        hasher.update(device.location.as_bytes());
        let mut code_seed = [0u8; 32];
        code_seed.copy_from_slice(&hasher.finalize()[..32]);

        EncryptionMediator {
            context,
            device,
            code_seed,
        }
    }

    /// Encrypt one ballot. The contest and selection structure must
    /// match the context's manifest exactly; votes above one per
    /// selection or above the contest limit are caller errors.
    pub fn encrypt(&mut self, ballot: &PlaintextBallot) -> Result<EncryptedBallot, Error> {
        let manifest = &self.context.manifest;
        let joint_key = &self.context.joint_key.joint_public_key;

        let mut contests = Vec::new();
        for description in manifest.style_contests(&ballot.style_id)? {
            let marked = ballot.contest(&description.object_id)?;

            let mut selections = Vec::with_capacity(description.ballot_selections.len());
            let mut accumulation = Ciphertext::zero();
            let mut aggregate_nonce = Scalar::ZERO;
            let mut total = 0u64;

            for selection in &description.ballot_selections {
                let vote = match marked
                    .selections
                    .iter()
                    .find(|s| s.object_id == selection.object_id)
                {
                    Some(marked_selection) => marked_selection.vote,
                    None => 0,
                };
                if vote > 1 {
                    return Err(Error::InvalidSelection {
                        contest: description.object_id.clone(),
                        candidate: selection.candidate_id.clone(),
                    });
                }
                total += vote;

                let nonce = random_scalar();
                let ciphertext = Ciphertext::encrypt(vote, &nonce, joint_key);
                let proof = DisjunctiveProof::prove(&ciphertext, vote, &nonce, joint_key);

                accumulation.accumulate(&ciphertext);
                aggregate_nonce += nonce;
                selections.push(EncryptedSelection {
                    object_id: selection.object_id.clone(),
                    ciphertext,
                    proof,
                });
            }

            // Marked selections that are not part of the contest are a
            // caller error, not silently dropped.
            for marked_selection in &marked.selections {
                if !description
                    .ballot_selections
                    .iter()
                    .any(|s| s.object_id == marked_selection.object_id)
                {
                    return Err(Error::InvalidSelection {
                        contest: description.object_id.clone(),
                        candidate: marked_selection.object_id.clone(),
                    });
                }
            }

            if total > description.votes_allowed {
                return Err(Error::SelectionLimitExceeded {
                    contest: description.object_id.clone(),
                    votes: total,
                    allowed: description.votes_allowed,
                });
            }

            let selection_limit_proof =
                ConstantProof::prove(&accumulation, total, &aggregate_nonce, joint_key);

            contests.push(EncryptedContest {
                object_id: description.object_id.clone(),
                selections,
                selection_limit_proof,
            });
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut encrypted = EncryptedBallot {
            object_id: ballot.object_id.clone(),
            style_id: ballot.style_id.clone(),
            contests,
            tracking_code: String::new(),
            timestamp,
            state: BallotState::Unknown,
        };

        // Advance the hash chain and stamp the tracking code.
        let mut hasher = Sha256::new();
        hasher.update(b"ballotguard::tracking_code");
        hasher.update(self.code_seed);
        hasher.update(timestamp.to_be_bytes());
        hasher.update(encrypted.crypto_hash());
        self.code_seed.copy_from_slice(&hasher.finalize()[..32]);
        encrypted.tracking_code = hex::encode(self.code_seed);

        Ok(encrypted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::tests::example_manifest;

    fn test_context() -> Arc<ElectionContext> {
        let details = CeremonyDetails::new(1, 1).unwrap();
        let mut mediator = KeyCeremonyMediator::new("ceremony", details);
        let guardian = Guardian::new("guardian-1", 1, details);
        mediator.announce(guardian.share_public_keys()).unwrap();
        mediator.receive_backups(1, vec![]).unwrap();
        mediator.receive_backup_verifications(vec![]).unwrap();
        let joint_key = mediator.publish_joint_key().unwrap();

        ElectionBuilder::new(details, example_manifest())
            .set_joint_key(joint_key)
            .build()
            .unwrap()
    }

    fn marked_ballot(object_id: &str) -> PlaintextBallot {
        PlaintextBallot {
            object_id: object_id.to_owned(),
            style_id: "style-1".to_owned(),
            contests: vec![PlaintextContest {
                object_id: "contest-mayor".to_owned(),
                selections: vec![
                    PlaintextSelection {
                        object_id: "selection-ashe".to_owned(),
                        vote: 1,
                    },
                    PlaintextSelection {
                        object_id: "selection-brook".to_owned(),
                        vote: 0,
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_encrypt_produces_verifiable_ballot() {
        let context = test_context();
        let device = EncryptionDevice::new(generate_device_uuid(), 1234, "test-device");
        let mut mediator = EncryptionMediator::new(context.clone(), device);

        let encrypted = mediator.encrypt(&marked_ballot("ballot-1")).unwrap();
        encrypted.verify(&context).unwrap();

        assert_eq!(encrypted.state, BallotState::Unknown);
        assert_eq!(encrypted.contests.len(), 1);
        assert_eq!(encrypted.contests[0].selections.len(), 2);
        assert!(!encrypted.tracking_code.is_empty());
    }

    #[test]
    fn test_tracking_codes_chain() {
        let context = test_context();
        let device = EncryptionDevice::new(generate_device_uuid(), 1234, "test-device");
        let mut mediator = EncryptionMediator::new(context, device);

        let first = mediator.encrypt(&marked_ballot("ballot-1")).unwrap();
        let second = mediator.encrypt(&marked_ballot("ballot-2")).unwrap();
        assert_ne!(first.tracking_code, second.tracking_code);
    }

    #[test]
    fn test_overvote_is_rejected() {
        let context = test_context();
        let device = EncryptionDevice::new(generate_device_uuid(), 1234, "test-device");
        let mut mediator = EncryptionMediator::new(context, device);

        let mut ballot = marked_ballot("ballot-1");
        ballot.contests[0].selections[1].vote = 1;

        assert!(matches!(
            mediator.encrypt(&ballot),
            Err(Error::SelectionLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_unknown_selection_is_rejected() {
        let context = test_context();
        let device = EncryptionDevice::new(generate_device_uuid(), 1234, "test-device");
        let mut mediator = EncryptionMediator::new(context, device);

        let mut ballot = marked_ballot("ballot-1");
        ballot.contests[0].selections.push(PlaintextSelection {
            object_id: "selection-ghost".to_owned(),
            vote: 0,
        });

        assert!(matches!(
            mediator.encrypt(&ballot),
            Err(Error::InvalidSelection { .. })
        ));
    }
}
