use crate::*;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Stores encrypted ballots and enforces the cast/spoil state machine.
///
/// Only ballots in a terminal state are stored, so presence in the map
/// is equivalent to "finalized". The state transition happens under the
/// write lock: of two concurrent submissions for the same ballot id,
/// exactly one wins and the other observes `AlreadyFinalized`. Reads
/// take a snapshot, so a concurrent tally never sees a half-recorded
/// ballot.
#[derive(Default)]
pub struct BallotBox {
    inner: RwLock<BTreeMap<String, EncryptedBallot>>,
}

impl BallotBox {
    pub fn new() -> Self {
        BallotBox::default()
    }

    /// Record the ballot as CAST. Fails if the ballot id already reached
    /// a terminal state.
    pub fn cast(&self, ballot: EncryptedBallot) -> Result<(), Error> {
        self.finalize(ballot, BallotState::Cast)
    }

    /// Record the ballot as SPOILED. Fails if the ballot id already
    /// reached a terminal state.
    pub fn spoil(&self, ballot: EncryptedBallot) -> Result<(), Error> {
        self.finalize(ballot, BallotState::Spoiled)
    }

    fn finalize(&self, mut ballot: EncryptedBallot, state: BallotState) -> Result<(), Error> {
        let mut inner = self.inner.write().unwrap();
        if let Some(existing) = inner.get(&ballot.object_id) {
            return Err(Error::AlreadyFinalized {
                ballot_id: ballot.object_id.clone(),
                state: existing.state,
            });
        }
        ballot.state = state;
        inner.insert(ballot.object_id.clone(), ballot);
        Ok(())
    }

    /// Snapshot of all ballots currently in the requested state.
    pub fn get_ballots(&self, state: BallotState) -> Vec<EncryptedBallot> {
        let inner = self.inner.read().unwrap();
        inner
            .values()
            .filter(|b| b.state == state)
            .cloned()
            .collect()
    }

    pub fn get(&self, ballot_id: &str) -> Option<EncryptedBallot> {
        let inner = self.inner.read().unwrap();
        inner.get(ballot_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}
