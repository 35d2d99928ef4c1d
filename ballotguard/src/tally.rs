use crate::*;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The running homomorphic aggregate of a set of encrypted ballots.
///
/// Built fresh from a ballot-box snapshot for every tally request; never
/// persisted between requests.
pub struct CiphertextTally {
    pub object_id: String,
    pub contests: IndexMap<String, CiphertextTallyContest>,
    appended: BTreeSet<String>,
}

pub struct CiphertextTallyContest {
    pub object_id: String,
    pub selections: IndexMap<String, Ciphertext>,
}

impl CiphertextTally {
    /// An empty tally shaped by the context's manifest: one zero
    /// ciphertext per selection, in manifest order.
    pub fn new(object_id: impl Into<String>, context: &Arc<ElectionContext>) -> Self {
        let mut contests = IndexMap::new();
        for contest in &context.manifest.contests {
            let mut selections = IndexMap::new();
            for selection in &contest.ballot_selections {
                selections.insert(selection.object_id.clone(), Ciphertext::zero());
            }
            contests.insert(
                contest.object_id.clone(),
                CiphertextTallyContest {
                    object_id: contest.object_id.clone(),
                    selections,
                },
            );
        }

        CiphertextTally {
            object_id: object_id.into(),
            contests,
            appended: BTreeSet::new(),
        }
    }

    /// Fold one ballot into the aggregate. A ballot id can only be
    /// appended once per tally.
    pub fn append(&mut self, ballot: &EncryptedBallot) -> Result<(), Error> {
        if self.appended.contains(&ballot.object_id) {
            return Err(Error::AlreadyFinalized {
                ballot_id: ballot.object_id.clone(),
                state: ballot.state,
            });
        }

        for contest in &ballot.contests {
            let tally_contest = self
                .contests
                .get_mut(&contest.object_id)
                .ok_or_else(|| Error::ContestNotFound(contest.object_id.clone()))?;
            for selection in &contest.selections {
                let accumulated = tally_contest
                    .selections
                    .get_mut(&selection.object_id)
                    .ok_or_else(|| Error::CandidateNotFound(selection.object_id.clone()))?;
                accumulated.accumulate(&selection.ciphertext);
            }
        }

        self.appended.insert(ballot.object_id.clone());
        Ok(())
    }

    /// Number of ballots folded in so far. Bounds the discrete-log
    /// search during decryption.
    pub fn ballot_count(&self) -> u64 {
        self.appended.len() as u64
    }
}

/// The decrypted result: per-selection counts, in manifest order.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaintextTally {
    pub object_id: String,
    pub contests: IndexMap<String, PlaintextTallyContest>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaintextTallyContest {
    pub object_id: String,
    pub selections: IndexMap<String, PlaintextTallySelection>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaintextTallySelection {
    pub object_id: String,
    pub tally: u64,
}

impl PlaintextTally {
    /// The count for one selection, if present.
    pub fn tally_of(&self, contest_id: &str, selection_id: &str) -> Option<u64> {
        self.contests
            .get(contest_id)
            .and_then(|c| c.selections.get(selection_id))
            .map(|s| s.tally)
    }
}
