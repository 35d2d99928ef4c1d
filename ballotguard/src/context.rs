use crate::*;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// The immutable context every encryption and decryption is bound to.
///
/// Built once after the key ceremony and shared by reference across the
/// encryption mediator, ballot box and decryption mediator.
#[derive(Debug, Clone)]
pub struct ElectionContext {
    pub manifest: Manifest,
    pub ceremony: CeremonyDetails,
    pub joint_key: ElectionJointKey,
    /// Hash binding the manifest, ceremony details and joint key
    /// together; seeds the per-device tracking code chain.
    pub crypto_base_hash: [u8; 32],
}

/// Combines the manifest, ceremony details and joint key into one
/// `ElectionContext`. A pure function of its inputs: the same inputs
/// always produce the same context, and an invalid manifest fails the
/// build rather than producing a partial context.
pub struct ElectionBuilder {
    ceremony: CeremonyDetails,
    manifest: Manifest,
    joint_key: Option<ElectionJointKey>,
}

impl ElectionBuilder {
    pub fn new(ceremony: CeremonyDetails, manifest: Manifest) -> Self {
        ElectionBuilder {
            ceremony,
            manifest,
            joint_key: None,
        }
    }

    pub fn set_joint_key(mut self, joint_key: ElectionJointKey) -> Self {
        self.joint_key = Some(joint_key);
        self
    }

    pub fn build(self) -> Result<Arc<ElectionContext>, Error> {
        self.manifest.validate()?;

        let joint_key = self
            .joint_key
            .ok_or(Error::CeremonyIncomplete("joint key not set"))?;

        let mut hasher = Sha256::new();
        hasher.update(b"ballotguard::context");
        hasher.update(self.manifest.election_scope_id.as_bytes());
        hasher.update(serde_json::to_vec(&self.manifest)?);
        hasher.update(self.ceremony.number_of_guardians.to_be_bytes());
        hasher.update(self.ceremony.quorum.to_be_bytes());
        hasher.update(joint_key.joint_public_key.compress().to_bytes());
        hasher.update(joint_key.commitment_hash);
        let mut crypto_base_hash = [0u8; 32];
        crypto_base_hash.copy_from_slice(&hasher.finalize()[..32]);

        Ok(Arc::new(ElectionContext {
            manifest: self.manifest,
            ceremony: self.ceremony,
            joint_key,
            crypto_base_hash,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::tests::example_manifest;

    fn published_joint_key() -> ElectionJointKey {
        let details = CeremonyDetails::new(1, 1).unwrap();
        let mut mediator = KeyCeremonyMediator::new("ceremony", details);
        let guardian = Guardian::new("guardian-1", 1, details);
        mediator.announce(guardian.share_public_keys()).unwrap();
        mediator.receive_backups(1, vec![]).unwrap();
        mediator.receive_backup_verifications(vec![]).unwrap();
        mediator.publish_joint_key().unwrap()
    }

    #[test]
    fn test_build_is_deterministic() {
        let details = CeremonyDetails::new(1, 1).unwrap();
        let joint_key = published_joint_key();

        let a = ElectionBuilder::new(details, example_manifest())
            .set_joint_key(joint_key.clone())
            .build()
            .unwrap();
        let b = ElectionBuilder::new(details, example_manifest())
            .set_joint_key(joint_key)
            .build()
            .unwrap();

        assert_eq!(a.crypto_base_hash, b.crypto_base_hash);
    }

    #[test]
    fn test_invalid_manifest_fails_build() {
        let details = CeremonyDetails::new(1, 1).unwrap();
        let mut manifest = example_manifest();
        manifest.ballot_styles[0].geopolitical_unit_ids = vec!["district-ghost".to_owned()];

        let result = ElectionBuilder::new(details, manifest)
            .set_joint_key(published_joint_key())
            .build();
        assert!(matches!(result, Err(Error::InvalidManifest(_))));
    }

    #[test]
    fn test_missing_joint_key_fails_build() {
        let details = CeremonyDetails::new(1, 1).unwrap();
        let result = ElectionBuilder::new(details, example_manifest()).build();
        assert!(matches!(result, Err(Error::CeremonyIncomplete(_))));
    }
}
