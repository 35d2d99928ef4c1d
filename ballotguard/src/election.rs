use crate::*;
use log::info;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Everything needed to initialize an election.
#[derive(Debug, Clone)]
pub struct ElectionConfig {
    pub name: String,
    pub number_of_guardians: u32,
    pub quorum: u32,
    pub launch_code: u64,
    pub manifest: Manifest,
    /// Directory for the append-only audit hash logs; `None` disables
    /// them.
    pub storage_dir: Option<PathBuf>,
}

impl ElectionConfig {
    /// Read the configuration from `BALLOTGUARD_*` environment
    /// variables. Unset variables fall back to a two-guardian,
    /// quorum-of-two election.
    pub fn from_env() -> Result<Self, Error> {
        use std::env::var;

        let manifest_path = var("BALLOTGUARD_MANIFEST_PATH")
            .unwrap_or_else(|_| "data/manifest.json".to_owned());
        let manifest = Manifest::from_file(&manifest_path)?;

        let number_of_guardians = var("BALLOTGUARD_NUM_GUARDIANS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);
        let quorum = var("BALLOTGUARD_QUORUM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);
        let launch_code = var("BALLOTGUARD_LAUNCH_CODE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let name =
            var("BALLOTGUARD_NAME").unwrap_or_else(|_| "ballotguard-election".to_owned());
        let storage_dir = var("BALLOTGUARD_STORAGE_DIR").ok().map(PathBuf::from);

        Ok(ElectionConfig {
            name,
            number_of_guardians,
            quorum,
            launch_code,
            manifest,
            storage_dir,
        })
    }
}

/// The voter's receipt for a submitted ballot.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BallotReceipt {
    pub verification_code: String,
    pub timestamp: u64,
    /// Content hash of the plaintext ballot as submitted.
    pub unenc_hash: String,
    /// Hash binding the encrypted ballot to a fixed reference value.
    pub enc_hash: String,
}

/// The whole election lifecycle in one value.
///
/// `initialize` runs the key ceremony, builds the context and creates
/// the mediators and an empty ballot box: either the entire sequence
/// succeeds and ballots can be accepted, or it fails and no `Election`
/// exists. There is no global state; callers pass this value around
/// explicitly.
pub struct Election {
    pub name: String,
    context: Arc<ElectionContext>,
    guardians: Vec<Guardian>,
    encryption_mediator: Mutex<EncryptionMediator>,
    ballot_box: BallotBox,
    audit_log: Option<AuditLog>,
}

impl Election {
    pub fn initialize(config: ElectionConfig) -> Result<Self, Error> {
        let details = CeremonyDetails::new(config.number_of_guardians, config.quorum)?;
        config.manifest.validate()?;

        info!(
            "election {}: starting key ceremony with {} guardians, quorum {}",
            config.name, details.number_of_guardians, details.quorum
        );

        let mut guardians: Vec<Guardian> = (1..=details.number_of_guardians)
            .map(|sequence| {
                Guardian::new(format!("guardian-{:02}", sequence), sequence, details)
            })
            .collect();
        let mut ceremony =
            KeyCeremonyMediator::new(format!("{}-key-ceremony-mediator", config.name), details);

        // Announce: every guardian publishes its public keys, then saves
        // the keys its peers announced.
        for guardian in &guardians {
            ceremony.announce(guardian.share_public_keys())?;
        }
        for guardian in guardians.iter_mut() {
            for keys in ceremony.share_announced(guardian.sequence)? {
                guardian.save_guardian_public_keys(keys);
            }
        }

        // Backup exchange: every guardian seals one backup per peer and
        // receives the backups addressed to it.
        for guardian in guardians.iter_mut() {
            let backups = guardian.generate_partial_key_backups()?;
            ceremony.receive_backups(guardian.sequence, backups)?;
        }
        for guardian in guardians.iter_mut() {
            for backup in ceremony.share_backups(guardian.sequence)? {
                guardian.save_partial_key_backup(backup);
            }
        }

        // Verification: every guardian checks every backup it received.
        for guardian in guardians.iter_mut() {
            let mut verifications = Vec::new();
            for owner_sequence in 1..=details.number_of_guardians {
                if owner_sequence != guardian.sequence {
                    verifications.push(guardian.verify_partial_key_backup(owner_sequence)?);
                }
            }
            ceremony.receive_backup_verifications(verifications)?;
        }

        let joint_key = ceremony.publish_joint_key()?;

        let context = ElectionBuilder::new(details, config.manifest)
            .set_joint_key(joint_key)
            .build()?;

        let device = EncryptionDevice::new(
            generate_device_uuid(),
            config.launch_code,
            format!("{}-encryption-mediator", config.name),
        );
        let encryption_mediator = EncryptionMediator::new(context.clone(), device);

        let audit_log = match &config.storage_dir {
            Some(dir) => Some(AuditLog::new(dir)?),
            None => None,
        };

        info!("election {}: accepting ballots", config.name);

        Ok(Election {
            name: config.name,
            context,
            guardians,
            encryption_mediator: Mutex::new(encryption_mediator),
            ballot_box: BallotBox::new(),
            audit_log,
        })
    }

    pub fn context(&self) -> &Arc<ElectionContext> {
        &self.context
    }

    /// Contests and candidates for a ballot style.
    pub fn ballot_info(&self, style_id: &str) -> Result<BallotInfo, Error> {
        self.context.manifest.ballot_info(style_id)
    }

    /// Mark a ballot: one selection per contest, chosen by candidate id.
    /// Produces a plaintext ballot with a fresh unique id, the chosen
    /// selection marked 1 and every other selection marked 0.
    pub fn mark_ballot(
        &self,
        style_id: &str,
        selections: &BTreeMap<String, String>,
    ) -> Result<PlaintextBallot, Error> {
        let manifest = &self.context.manifest;

        let mut contests = Vec::new();
        for description in manifest.style_contests(style_id)? {
            let candidate_id = selections.get(&description.object_id).ok_or_else(|| {
                Error::InvalidSelection {
                    contest: description.object_id.clone(),
                    candidate: "<none>".to_owned(),
                }
            })?;
            let chosen = manifest.selection_for_candidate(&description.object_id, candidate_id)?;

            let marked = description
                .ballot_selections
                .iter()
                .map(|selection| PlaintextSelection {
                    object_id: selection.object_id.clone(),
                    vote: u64::from(selection.object_id == chosen.object_id),
                })
                .collect();

            contests.push(PlaintextContest {
                object_id: description.object_id.clone(),
                selections: marked,
            });
        }

        Ok(PlaintextBallot {
            object_id: format!("ballot-{}", Uuid::new_v4()),
            style_id: style_id.to_owned(),
            contests,
        })
    }

    /// Encrypt and finalize a ballot in one step, returning the voter's
    /// receipt. The encrypted ballot is verified against the context
    /// before it is accepted.
    pub fn submit_ballot(
        &self,
        ballot: &PlaintextBallot,
        action: BallotAction,
    ) -> Result<BallotReceipt, Error> {
        let unenc_hash = ballot.crypto_hash();

        let encrypted = self
            .encryption_mediator
            .lock()
            .unwrap()
            .encrypt(ballot)?;
        encrypted.verify(&self.context)?;

        // Bind the encrypted ballot to a fixed reference value for the
        // receipt.
        let mut hasher = Sha256::new();
        hasher.update(encrypted.crypto_hash());
        hasher.update([0u8; 32]);
        let mut enc_hash = [0u8; 32];
        enc_hash.copy_from_slice(&hasher.finalize()[..32]);

        if let Some(audit_log) = &self.audit_log {
            audit_log.append_received(&unenc_hash)?;
        }

        let receipt = BallotReceipt {
            verification_code: encrypted.tracking_code.clone(),
            timestamp: encrypted.timestamp,
            unenc_hash: hex::encode(unenc_hash),
            enc_hash: hex::encode(enc_hash),
        };

        match action {
            BallotAction::Cast => {
                self.ballot_box.cast(encrypted)?;
                if let Some(audit_log) = &self.audit_log {
                    audit_log.append_counted(&enc_hash)?;
                }
            }
            BallotAction::Spoil => self.ballot_box.spoil(encrypted)?,
        }

        info!(
            "election {}: ballot {} submitted as {:?}",
            self.name, ballot.object_id, action
        );

        Ok(receipt)
    }

    pub fn ballot_box(&self) -> &BallotBox {
        &self.ballot_box
    }

    /// Tally and decrypt the election result.
    ///
    /// A pure recomputation: every call snapshots the ballot box, builds
    /// a fresh ciphertext tally, gathers fresh guardian shares and
    /// combines them. Nothing is cached between calls.
    pub fn get_election_tally(&self) -> Result<PlaintextTally, Error> {
        let cast_ballots = self.ballot_box.get_ballots(BallotState::Cast);

        let mut tally = CiphertextTally::new(format!("{}-tally", self.name), &self.context);
        for ballot in &cast_ballots {
            tally.append(ballot)?;
        }

        let mut mediator = DecryptionMediator::new(
            format!("{}-decryption-mediator", self.name),
            self.context.clone(),
        );
        for guardian in &self.guardians {
            let keys = guardian.share_public_keys();
            let tally_share = guardian.compute_tally_share(&tally)?;
            mediator.announce(keys, Some(tally_share), BTreeMap::new())?;
        }

        mediator.get_plaintext_tally(&tally)
    }

    /// Decrypt a single spoiled ballot by its verification code.
    ///
    /// Returns `Ok(None)` when no spoiled ballot matches; a CAST ballot
    /// is deliberately not decryptable this way.
    pub fn challenge_ballot(
        &self,
        verification_code: &str,
    ) -> Result<Option<PlaintextTally>, Error> {
        let spoiled_ballots = self.ballot_box.get_ballots(BallotState::Spoiled);

        let challenged = match spoiled_ballots
            .iter()
            .find(|b| b.tracking_code == verification_code)
        {
            Some(ballot) => ballot.clone(),
            None => return Ok(None),
        };

        let targets = std::slice::from_ref(&challenged);
        let mut mediator = DecryptionMediator::new(
            format!("{}-decryption-mediator", self.name),
            self.context.clone(),
        );
        for guardian in &self.guardians {
            let keys = guardian.share_public_keys();
            let ballot_shares = guardian.compute_ballot_shares(targets)?;
            mediator.announce(keys, None, ballot_shares)?;
        }

        let mut decrypted = mediator.get_plaintext_ballots(targets)?;
        Ok(decrypted.remove(&challenged.object_id))
    }
}
