use crate::{BallotState, CeremonyPhase};

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("ballotguard: ballot style not found: {0}")]
    BallotStyleNotFound(String),

    #[error("ballotguard: contest not found: {0}")]
    ContestNotFound(String),

    #[error("ballotguard: candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("ballotguard: candidate {candidate} is not a valid selection for contest {contest}")]
    InvalidSelection { contest: String, candidate: String },

    #[error(
        "ballotguard: contest {contest} has {votes} votes but allows at most {allowed}"
    )]
    SelectionLimitExceeded {
        contest: String,
        votes: u64,
        allowed: u64,
    },

    #[error("ballotguard: ballot {ballot_id} is already {state}")]
    AlreadyFinalized {
        ballot_id: String,
        state: BallotState,
    },

    #[error(
        "ballotguard: guardian {verifier} failed to verify the partial key backup issued by guardian {subject}"
    )]
    CeremonyVerificationFailed { verifier: String, subject: String },

    #[error("ballotguard: not enough decryption shares: need {required}, have {announced}")]
    InsufficientShares { required: u32, announced: u32 },

    #[error(
        "ballotguard: invalid ceremony details: {number_of_guardians} guardians with quorum {quorum}"
    )]
    InvalidCeremonyDetails {
        number_of_guardians: u32,
        quorum: u32,
    },

    #[error("ballotguard: ceremony is in phase {actual}, operation requires phase {expected}")]
    CeremonyOutOfPhase {
        expected: CeremonyPhase,
        actual: CeremonyPhase,
    },

    #[error("ballotguard: guardian sequence {0} announced twice")]
    DuplicateGuardian(u32),

    #[error("ballotguard: unknown guardian sequence {0}")]
    UnknownGuardian(u32),

    #[error("ballotguard: guardian sequence {0} is out of range for this ceremony")]
    GuardianOutOfRange(u32),

    #[error("ballotguard: proof of key possession failed for guardian {0}")]
    InvalidKeyProof(String),

    #[error("ballotguard: guardian {0} is missing announced keys for its peers")]
    MissingGuardianKeys(String),

    #[error("ballotguard: guardian {owner} submitted {found} backups, expected {expected}")]
    WrongNumberOfBackups {
        owner: u32,
        expected: u32,
        found: u32,
    },

    #[error("ballotguard: ceremony incomplete: {0}")]
    CeremonyIncomplete(&'static str),

    #[error("ballotguard: invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("ballotguard: ballot {0} failed proof verification")]
    InvalidBallotProof(String),

    #[error("ballotguard: failed to decode decrypted value")]
    DecryptionFailed,

    #[error("ballotguard: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ballotguard: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
