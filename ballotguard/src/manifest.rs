use crate::*;
use std::collections::HashSet;
use std::path::Path;

/// The ballot design for an election: who can be voted for, in which
/// contests, on which ballot styles.
///
/// Lists keep their file order; lookups return explicit `Result`s so
/// callers branch on outcome instead of catching exhausted iteration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Manifest {
    pub election_scope_id: String,
    pub geopolitical_units: Vec<GeopoliticalUnit>,
    #[serde(default)]
    pub parties: Vec<Party>,
    pub candidates: Vec<Candidate>,
    pub contests: Vec<ContestDescription>,
    pub ballot_styles: Vec<BallotStyle>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GeopoliticalUnit {
    pub object_id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Party {
    pub object_id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Candidate {
    pub object_id: String,
    pub name: String,
    #[serde(default)]
    pub party_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContestDescription {
    pub object_id: String,
    pub electoral_district_id: String,
    pub sequence_order: u32,
    pub name: String,
    /// Maximum number of selections a voter may mark in this contest.
    pub votes_allowed: u64,
    pub ballot_selections: Vec<SelectionDescription>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SelectionDescription {
    pub object_id: String,
    pub sequence_order: u32,
    pub candidate_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BallotStyle {
    pub object_id: String,
    pub geopolitical_unit_ids: Vec<String>,
}

/// Ballot-style information compiled for a voter-facing device.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BallotInfo {
    pub style_id: String,
    pub contests: Vec<ContestInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContestInfo {
    pub object_id: String,
    pub sequence_order: u32,
    pub name: String,
    pub votes_allowed: u64,
    pub candidates: Vec<CandidateInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CandidateInfo {
    pub object_id: String,
    pub name: String,
    pub party: String,
}

impl Manifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = std::fs::read(path)?;
        let manifest: Manifest = serde_json::from_slice(&bytes)?;
        Ok(manifest)
    }

    /// Structural validation: every cross-reference must resolve and the
    /// contest shapes must be usable for encryption.
    pub fn validate(&self) -> Result<(), Error> {
        let unit_ids: HashSet<&str> = self
            .geopolitical_units
            .iter()
            .map(|u| u.object_id.as_str())
            .collect();
        let party_ids: HashSet<&str> = self.parties.iter().map(|p| p.object_id.as_str()).collect();
        let candidate_ids: HashSet<&str> = self
            .candidates
            .iter()
            .map(|c| c.object_id.as_str())
            .collect();

        for candidate in &self.candidates {
            if let Some(party_id) = &candidate.party_id {
                if !party_ids.contains(party_id.as_str()) {
                    return Err(Error::InvalidManifest(format!(
                        "candidate {} references unknown party {}",
                        candidate.object_id, party_id
                    )));
                }
            }
        }

        for style in &self.ballot_styles {
            for unit_id in &style.geopolitical_unit_ids {
                if !unit_ids.contains(unit_id.as_str()) {
                    return Err(Error::InvalidManifest(format!(
                        "ballot style {} references unknown geopolitical unit {}",
                        style.object_id, unit_id
                    )));
                }
            }
        }

        for contest in &self.contests {
            if !unit_ids.contains(contest.electoral_district_id.as_str()) {
                return Err(Error::InvalidManifest(format!(
                    "contest {} references unknown geopolitical unit {}",
                    contest.object_id, contest.electoral_district_id
                )));
            }
            if contest.ballot_selections.is_empty() {
                return Err(Error::InvalidManifest(format!(
                    "contest {} has no selections",
                    contest.object_id
                )));
            }
            if contest.votes_allowed == 0 {
                return Err(Error::InvalidManifest(format!(
                    "contest {} allows zero votes",
                    contest.object_id
                )));
            }
            for selection in &contest.ballot_selections {
                if !candidate_ids.contains(selection.candidate_id.as_str()) {
                    return Err(Error::InvalidManifest(format!(
                        "selection {} references unknown candidate {}",
                        selection.object_id, selection.candidate_id
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn ballot_style(&self, style_id: &str) -> Result<&BallotStyle, Error> {
        self.ballot_styles
            .iter()
            .find(|s| s.object_id == style_id)
            .ok_or_else(|| Error::BallotStyleNotFound(style_id.to_owned()))
    }

    pub fn contest(&self, contest_id: &str) -> Result<&ContestDescription, Error> {
        self.contests
            .iter()
            .find(|c| c.object_id == contest_id)
            .ok_or_else(|| Error::ContestNotFound(contest_id.to_owned()))
    }

    pub fn candidate(&self, candidate_id: &str) -> Result<&Candidate, Error> {
        self.candidates
            .iter()
            .find(|c| c.object_id == candidate_id)
            .ok_or_else(|| Error::CandidateNotFound(candidate_id.to_owned()))
    }

    /// All contests applicable to a ballot style, in manifest order.
    pub fn style_contests(&self, style_id: &str) -> Result<Vec<&ContestDescription>, Error> {
        let style = self.ballot_style(style_id)?;
        Ok(self
            .contests
            .iter()
            .filter(|c| style.geopolitical_unit_ids.contains(&c.electoral_district_id))
            .collect())
    }

    /// The selection for a candidate within a contest.
    pub fn selection_for_candidate(
        &self,
        contest_id: &str,
        candidate_id: &str,
    ) -> Result<&SelectionDescription, Error> {
        let contest = self.contest(contest_id)?;
        contest
            .ballot_selections
            .iter()
            .find(|s| s.candidate_id == candidate_id)
            .ok_or_else(|| Error::InvalidSelection {
                contest: contest_id.to_owned(),
                candidate: candidate_id.to_owned(),
            })
    }

    /// Compile voter-facing contest and candidate information for a style.
    pub fn ballot_info(&self, style_id: &str) -> Result<BallotInfo, Error> {
        let contests = self.style_contests(style_id)?;

        let mut infos = Vec::with_capacity(contests.len());
        for contest in contests {
            let mut candidates = Vec::with_capacity(contest.ballot_selections.len());
            for selection in &contest.ballot_selections {
                let candidate = self.candidate(&selection.candidate_id)?;
                let party = match &candidate.party_id {
                    Some(party_id) => self
                        .parties
                        .iter()
                        .find(|p| &p.object_id == party_id)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| "N/A".to_owned()),
                    None => "N/A".to_owned(),
                };
                candidates.push(CandidateInfo {
                    object_id: candidate.object_id.clone(),
                    name: candidate.name.clone(),
                    party,
                });
            }
            infos.push(ContestInfo {
                object_id: contest.object_id.clone(),
                sequence_order: contest.sequence_order,
                name: contest.name.clone(),
                votes_allowed: contest.votes_allowed,
                candidates,
            });
        }

        Ok(BallotInfo {
            style_id: style_id.to_owned(),
            contests: infos,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// A single-district manifest with one two-candidate contest,
    /// used throughout the crate's tests.
    pub fn example_manifest() -> Manifest {
        serde_json::from_value(serde_json::json!({
            "election_scope_id": "county-election-2024",
            "geopolitical_units": [
                { "object_id": "district-9", "name": "District 9" }
            ],
            "parties": [
                { "object_id": "party-river", "name": "River Party" },
                { "object_id": "party-hill", "name": "Hill Party" }
            ],
            "candidates": [
                { "object_id": "candidate-ashe", "name": "M. Ashe", "party_id": "party-river" },
                { "object_id": "candidate-brook", "name": "T. Brook", "party_id": "party-hill" }
            ],
            "contests": [
                {
                    "object_id": "contest-mayor",
                    "electoral_district_id": "district-9",
                    "sequence_order": 1,
                    "name": "Mayor",
                    "votes_allowed": 1,
                    "ballot_selections": [
                        { "object_id": "selection-ashe", "sequence_order": 1, "candidate_id": "candidate-ashe" },
                        { "object_id": "selection-brook", "sequence_order": 2, "candidate_id": "candidate-brook" }
                    ]
                }
            ],
            "ballot_styles": [
                { "object_id": "style-1", "geopolitical_unit_ids": ["district-9"] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_validate() {
        let manifest = example_manifest();
        manifest.validate().unwrap();

        let mut broken = manifest.clone();
        broken.contests[0].ballot_selections[0].candidate_id = "candidate-ghost".to_owned();
        assert!(matches!(
            broken.validate(),
            Err(Error::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_lookups() {
        let manifest = example_manifest();

        assert!(manifest.ballot_style("style-1").is_ok());
        assert!(matches!(
            manifest.ballot_style("style-9"),
            Err(Error::BallotStyleNotFound(_))
        ));

        let contests = manifest.style_contests("style-1").unwrap();
        assert_eq!(contests.len(), 1);
        assert_eq!(contests[0].object_id, "contest-mayor");

        assert!(manifest
            .selection_for_candidate("contest-mayor", "candidate-ashe")
            .is_ok());
        assert!(matches!(
            manifest.selection_for_candidate("contest-mayor", "candidate-ghost"),
            Err(Error::InvalidSelection { .. })
        ));
    }

    #[test]
    fn test_ballot_info_resolves_parties() {
        let manifest = example_manifest();
        let info = manifest.ballot_info("style-1").unwrap();

        assert_eq!(info.contests.len(), 1);
        let candidates = &info.contests[0].candidates;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].party, "River Party");
    }
}
