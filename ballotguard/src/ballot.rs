use crate::*;
use sha2::{Digest, Sha256};

/// Lifecycle state of an encrypted ballot. `Cast` and `Spoiled` are
/// terminal; the ballot box never lets a ballot leave either of them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BallotState {
    Unknown,
    Cast,
    Spoiled,
}

impl std::fmt::Display for BallotState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            BallotState::Unknown => "UNKNOWN",
            BallotState::Cast => "CAST",
            BallotState::Spoiled => "SPOILED",
        };
        write!(f, "{}", name)
    }
}

/// What a voter submits: `CAST` to count the ballot, `SPOIL` to discard
/// it while keeping the right to challenge its decryption.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BallotAction {
    Cast,
    Spoil,
}

/// A marked but not yet encrypted ballot.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaintextBallot {
    pub object_id: String,
    pub style_id: String,
    pub contests: Vec<PlaintextContest>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaintextContest {
    pub object_id: String,
    pub selections: Vec<PlaintextSelection>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaintextSelection {
    pub object_id: String,
    pub vote: u64,
}

impl PlaintextBallot {
    pub fn contest(&self, contest_id: &str) -> Result<&PlaintextContest, Error> {
        self.contests
            .iter()
            .find(|c| c.object_id == contest_id)
            .ok_or_else(|| Error::ContestNotFound(contest_id.to_owned()))
    }

    /// Content hash of the ballot exactly as submitted.
    pub fn crypto_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"ballotguard::plaintext_ballot");
        hasher.update(serde_json::to_vec(self).expect("ballotguard: ballot serialization"));
        let out = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&out[..32]);
        hash
    }
}

/// An encrypted ballot bound to the election context.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncryptedBallot {
    pub object_id: String,
    pub style_id: String,
    pub contests: Vec<EncryptedContest>,
    /// Hash-chain tracking code, hex encoded. This is the voter's
    /// verification code.
    pub tracking_code: String,
    pub timestamp: u64,
    pub state: BallotState,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncryptedContest {
    pub object_id: String,
    pub selections: Vec<EncryptedSelection>,
    /// Proof that the homomorphic total of the contest's selections
    /// encrypts the stated count.
    pub selection_limit_proof: ConstantProof,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncryptedSelection {
    pub object_id: String,
    pub ciphertext: Ciphertext,
    pub proof: DisjunctiveProof,
}

impl EncryptedContest {
    /// Homomorphic sum of all selection ciphertexts in this contest.
    pub fn accumulation(&self) -> Ciphertext {
        let mut acc = Ciphertext::zero();
        for selection in &self.selections {
            acc.accumulate(&selection.ciphertext);
        }
        acc
    }
}

impl EncryptedBallot {
    /// Hash over the ballot's ciphertext contents, used for the tracking
    /// code chain and the voter's encrypted-ballot receipt.
    pub fn crypto_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"ballotguard::encrypted_ballot");
        hasher.update(self.object_id.as_bytes());
        hasher.update(self.style_id.as_bytes());
        for contest in &self.contests {
            hasher.update(contest.object_id.as_bytes());
            for selection in &contest.selections {
                hasher.update(selection.object_id.as_bytes());
                selection.ciphertext.hash_into(&mut hasher);
            }
        }
        let out = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&out[..32]);
        hash
    }

    /// Verify every selection and contest proof against the context.
    ///
    /// The error names the ballot so a rejected submission is attributable.
    pub fn verify(&self, context: &ElectionContext) -> Result<(), Error> {
        let joint_key = &context.joint_key.joint_public_key;

        for contest in &self.contests {
            for selection in &contest.selections {
                if !selection.proof.verify(&selection.ciphertext, joint_key) {
                    return Err(Error::InvalidBallotProof(self.object_id.clone()));
                }
            }

            let accumulation = contest.accumulation();
            let description = context.manifest.contest(&contest.object_id)?;
            if contest.selection_limit_proof.constant > description.votes_allowed {
                return Err(Error::SelectionLimitExceeded {
                    contest: contest.object_id.clone(),
                    votes: contest.selection_limit_proof.constant,
                    allowed: description.votes_allowed,
                });
            }
            if !contest
                .selection_limit_proof
                .verify(&accumulation, joint_key)
            {
                return Err(Error::InvalidBallotProof(self.object_id.clone()));
            }
        }

        Ok(())
    }
}
