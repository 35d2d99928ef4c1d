use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use indexmap::IndexMap;
use log::warn;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One guardian's partial decryption of a tally or of a single ballot:
/// a share value and a correctness proof per selection ciphertext.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DecryptionShare {
    /// The tally or ballot this share was computed against.
    pub target_id: String,
    pub guardian_id: String,
    pub sequence: u32,
    pub contests: IndexMap<String, ContestShare>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContestShare {
    pub selections: IndexMap<String, SelectionShare>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SelectionShare {
    pub share: RistrettoPoint,
    pub proof: ChaumPedersenProof,
}

struct Announcement {
    keys: GuardianPublicKeySet,
    tally_share: Option<DecryptionShare>,
    ballot_shares: BTreeMap<String, DecryptionShare>,
}

/// Collects per-guardian decryption shares and combines a quorum of them
/// into plaintext via Lagrange interpolation over sequence indices.
///
/// Share proofs are checked against the share verification keys the
/// ceremony published; a guardian whose proofs fail contributes nothing
/// and decryption below quorum fails with `InsufficientShares`.
pub struct DecryptionMediator {
    pub id: String,
    context: Arc<ElectionContext>,
    announced: BTreeMap<u32, Announcement>,
}

impl DecryptionMediator {
    pub fn new(id: impl Into<String>, context: Arc<ElectionContext>) -> Self {
        DecryptionMediator {
            id: id.into(),
            context,
            announced: BTreeMap::new(),
        }
    }

    /// Record one guardian's key set and shares. A duplicate
    /// announcement from the same guardian overwrites the previous one
    /// rather than double-counting.
    pub fn announce(
        &mut self,
        keys: GuardianPublicKeySet,
        tally_share: Option<DecryptionShare>,
        ballot_shares: BTreeMap<String, DecryptionShare>,
    ) -> Result<(), Error> {
        let sequence = keys.sequence;
        if !self
            .context
            .joint_key
            .share_verification_keys
            .contains_key(&sequence)
        {
            return Err(Error::UnknownGuardian(sequence));
        }
        if !keys.proof.verify(keys.election_public_key()) {
            return Err(Error::InvalidKeyProof(keys.owner_id));
        }
        for share in tally_share.iter().chain(ballot_shares.values()) {
            if share.sequence != sequence {
                return Err(Error::UnknownGuardian(share.sequence));
            }
        }

        self.announced.insert(
            sequence,
            Announcement {
                keys,
                tally_share,
                ballot_shares,
            },
        );
        Ok(())
    }

    /// How many guardians have announced so far.
    pub fn announced_count(&self) -> u32 {
        self.announced.len() as u32
    }

    /// Decrypt the aggregated tally. Requires valid shares from at
    /// least `quorum` guardians.
    pub fn get_plaintext_tally(&self, tally: &CiphertextTally) -> Result<PlaintextTally, Error> {
        let shares: BTreeMap<u32, &DecryptionShare> = self
            .announced
            .values()
            .filter_map(|a| a.tally_share.as_ref())
            .filter(|s| s.target_id == tally.object_id)
            .map(|s| (s.sequence, s))
            .collect();

        let mut contests = IndexMap::new();
        for (contest_id, tally_contest) in &tally.contests {
            let mut selections = IndexMap::new();
            for (selection_id, ciphertext) in &tally_contest.selections {
                let count = self.combine(
                    ciphertext,
                    contest_id,
                    selection_id,
                    &shares,
                    tally.ballot_count(),
                )?;
                selections.insert(
                    selection_id.clone(),
                    PlaintextTallySelection {
                        object_id: selection_id.clone(),
                        tally: count,
                    },
                );
            }
            contests.insert(
                contest_id.clone(),
                PlaintextTallyContest {
                    object_id: contest_id.clone(),
                    selections,
                },
            );
        }

        Ok(PlaintextTally {
            object_id: tally.object_id.clone(),
            contests,
        })
    }

    /// Decrypt individual ballots (the challenge path), keyed by ballot
    /// id. Each selection decrypts to its original 0/1 marking.
    pub fn get_plaintext_ballots(
        &self,
        ballots: &[EncryptedBallot],
    ) -> Result<BTreeMap<String, PlaintextTally>, Error> {
        let mut decrypted = BTreeMap::new();

        for ballot in ballots {
            let shares: BTreeMap<u32, &DecryptionShare> = self
                .announced
                .values()
                .filter_map(|a| a.ballot_shares.get(&ballot.object_id))
                .map(|s| (s.sequence, s))
                .collect();

            let mut contests = IndexMap::new();
            for contest in &ballot.contests {
                let mut selections = IndexMap::new();
                for selection in &contest.selections {
                    let count = self.combine(
                        &selection.ciphertext,
                        &contest.object_id,
                        &selection.object_id,
                        &shares,
                        1,
                    )?;
                    selections.insert(
                        selection.object_id.clone(),
                        PlaintextTallySelection {
                            object_id: selection.object_id.clone(),
                            tally: count,
                        },
                    );
                }
                contests.insert(
                    contest.object_id.clone(),
                    PlaintextTallyContest {
                        object_id: contest.object_id.clone(),
                        selections,
                    },
                );
            }

            decrypted.insert(
                ballot.object_id.clone(),
                PlaintextTally {
                    object_id: ballot.object_id.clone(),
                    contests,
                },
            );
        }

        Ok(decrypted)
    }

    /// Combine one selection's shares: verify each proof, then
    /// interpolate the first `quorum` valid shares in sequence order.
    fn combine(
        &self,
        ciphertext: &Ciphertext,
        contest_id: &str,
        selection_id: &str,
        shares: &BTreeMap<u32, &DecryptionShare>,
        max_tally: u64,
    ) -> Result<u64, Error> {
        let quorum = self.context.ceremony.quorum;
        let verification_keys = &self.context.joint_key.share_verification_keys;

        // Collect valid (sequence, share value) pairs in sequence order.
        let mut valid: Vec<(u32, RistrettoPoint)> = Vec::new();
        for (&sequence, share) in shares {
            let selection_share = match share
                .contests
                .get(contest_id)
                .and_then(|c| c.selections.get(selection_id))
            {
                Some(s) => s,
                None => continue,
            };
            let verification_key = &verification_keys[&sequence];
            if !selection_share.proof.verify(
                &ciphertext.pad,
                verification_key,
                &selection_share.share,
            ) {
                warn!(
                    "decryption {}: dropping share from guardian {} for {}/{}: proof failed",
                    self.id, share.guardian_id, contest_id, selection_id
                );
                continue;
            }
            valid.push((sequence, selection_share.share));
        }

        if (valid.len() as u32) < quorum {
            return Err(Error::InsufficientShares {
                required: quorum,
                announced: valid.len() as u32,
            });
        }
        valid.truncate(quorum as usize);

        let present: Vec<u32> = valid.iter().map(|(sequence, _)| *sequence).collect();
        let mut combined = identity();
        for (sequence, share) in &valid {
            combined += share * lagrange_coefficient(*sequence, &present);
        }

        ciphertext
            .decrypt_with_shares(&combined, max_tally)
            .ok_or(Error::DecryptionFailed)
    }
}
