use super::*;
use crate::manifest::tests::example_manifest;
use std::collections::BTreeMap;
use std::sync::Arc;

fn example_config(number_of_guardians: u32, quorum: u32) -> ElectionConfig {
    ElectionConfig {
        name: "test-election".to_owned(),
        number_of_guardians,
        quorum,
        launch_code: 1234,
        manifest: example_manifest(),
        storage_dir: None,
    }
}

fn vote_for(candidate_id: &str) -> BTreeMap<String, String> {
    let mut selections = BTreeMap::new();
    selections.insert("contest-mayor".to_owned(), candidate_id.to_owned());
    selections
}

/// Run the full key ceremony by hand and return the guardians and
/// context, for tests that need to drive decryption below the
/// orchestrator's API.
fn ceremony_by_hand(
    number_of_guardians: u32,
    quorum: u32,
) -> (Vec<Guardian>, Arc<ElectionContext>) {
    let details = CeremonyDetails::new(number_of_guardians, quorum).unwrap();
    let mut guardians: Vec<Guardian> = (1..=number_of_guardians)
        .map(|sequence| Guardian::new(format!("guardian-{:02}", sequence), sequence, details))
        .collect();
    let mut mediator = KeyCeremonyMediator::new("test-ceremony", details);

    for guardian in &guardians {
        mediator.announce(guardian.share_public_keys()).unwrap();
    }
    for guardian in guardians.iter_mut() {
        for keys in mediator.share_announced(guardian.sequence).unwrap() {
            guardian.save_guardian_public_keys(keys);
        }
    }
    for guardian in guardians.iter_mut() {
        let backups = guardian.generate_partial_key_backups().unwrap();
        mediator.receive_backups(guardian.sequence, backups).unwrap();
    }
    for guardian in guardians.iter_mut() {
        for backup in mediator.share_backups(guardian.sequence).unwrap() {
            guardian.save_partial_key_backup(backup);
        }
    }
    for guardian in guardians.iter_mut() {
        let mut verifications = Vec::new();
        for owner in 1..=number_of_guardians {
            if owner != guardian.sequence {
                verifications.push(guardian.verify_partial_key_backup(owner).unwrap());
            }
        }
        mediator.receive_backup_verifications(verifications).unwrap();
    }
    let joint_key = mediator.publish_joint_key().unwrap();

    let context = ElectionBuilder::new(details, example_manifest())
        .set_joint_key(joint_key)
        .build()
        .unwrap();

    (guardians, context)
}

#[test]
fn end_to_end_election() {
    let election = Election::initialize(example_config(2, 2)).unwrap();

    // 3 votes for Ashe, 2 for Brook.
    for candidate in [
        "candidate-ashe",
        "candidate-ashe",
        "candidate-ashe",
        "candidate-brook",
        "candidate-brook",
    ] {
        let ballot = election.mark_ballot("style-1", &vote_for(candidate)).unwrap();
        let receipt = election.submit_ballot(&ballot, BallotAction::Cast).unwrap();
        assert!(!receipt.verification_code.is_empty());
        assert!(!receipt.unenc_hash.is_empty());
        assert!(!receipt.enc_hash.is_empty());
    }

    let tally = election.get_election_tally().unwrap();
    assert_eq!(tally.tally_of("contest-mayor", "selection-ashe"), Some(3));
    assert_eq!(tally.tally_of("contest-mayor", "selection-brook"), Some(2));
}

#[test]
fn tally_recomputes_from_ballot_box() {
    let election = Election::initialize(example_config(2, 2)).unwrap();

    let ballot = election
        .mark_ballot("style-1", &vote_for("candidate-ashe"))
        .unwrap();
    election.submit_ballot(&ballot, BallotAction::Cast).unwrap();

    let first = election.get_election_tally().unwrap();
    assert_eq!(first.tally_of("contest-mayor", "selection-ashe"), Some(1));

    // A cast after the first tally must show up in the next one: no
    // caching across calls.
    let ballot = election
        .mark_ballot("style-1", &vote_for("candidate-ashe"))
        .unwrap();
    election.submit_ballot(&ballot, BallotAction::Cast).unwrap();

    let second = election.get_election_tally().unwrap();
    assert_eq!(second.tally_of("contest-mayor", "selection-ashe"), Some(2));
}

#[test]
fn spoiled_ballots_are_not_counted() {
    let election = Election::initialize(example_config(2, 2)).unwrap();

    let cast = election
        .mark_ballot("style-1", &vote_for("candidate-ashe"))
        .unwrap();
    election.submit_ballot(&cast, BallotAction::Cast).unwrap();

    let spoiled = election
        .mark_ballot("style-1", &vote_for("candidate-brook"))
        .unwrap();
    election.submit_ballot(&spoiled, BallotAction::Spoil).unwrap();

    let tally = election.get_election_tally().unwrap();
    assert_eq!(tally.tally_of("contest-mayor", "selection-ashe"), Some(1));
    assert_eq!(tally.tally_of("contest-mayor", "selection-brook"), Some(0));
}

#[test]
fn cast_and_spoiled_sets_are_disjoint() {
    let election = Election::initialize(example_config(2, 2)).unwrap();

    for (candidate, action) in [
        ("candidate-ashe", BallotAction::Cast),
        ("candidate-brook", BallotAction::Spoil),
        ("candidate-ashe", BallotAction::Spoil),
    ] {
        let ballot = election.mark_ballot("style-1", &vote_for(candidate)).unwrap();
        election.submit_ballot(&ballot, action).unwrap();
    }

    let cast = election.ballot_box().get_ballots(BallotState::Cast);
    let spoiled = election.ballot_box().get_ballots(BallotState::Spoiled);
    assert_eq!(cast.len(), 1);
    assert_eq!(spoiled.len(), 2);
    for ballot in &cast {
        assert!(!spoiled.iter().any(|s| s.object_id == ballot.object_id));
    }
}

#[test]
fn double_finalization_fails_and_state_is_unchanged() {
    let (_guardians, context) = ceremony_by_hand(2, 2);

    let device = EncryptionDevice::new(generate_device_uuid(), 1234, "test-device");
    let mut encryption = EncryptionMediator::new(context, device);
    let ballot_box = BallotBox::new();

    let plaintext = PlaintextBallot {
        object_id: "ballot-1".to_owned(),
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
    };
    let encrypted = encryption.encrypt(&plaintext).unwrap();

    // Cast then spoil.
    ballot_box.cast(encrypted.clone()).unwrap();
    match ballot_box.spoil(encrypted.clone()) {
        Err(Error::AlreadyFinalized { ballot_id, state }) => {
            assert_eq!(ballot_id, "ballot-1");
            assert_eq!(state, BallotState::Cast);
        }
        other => panic!("expected AlreadyFinalized, got {:?}", other.map(|_| ())),
    }
    assert_eq!(
        ballot_box.get("ballot-1").unwrap().state,
        BallotState::Cast
    );

    // Spoil then cast, with a fresh box.
    let ballot_box = BallotBox::new();
    ballot_box.spoil(encrypted.clone()).unwrap();
    match ballot_box.cast(encrypted) {
        Err(Error::AlreadyFinalized { state, .. }) => {
            assert_eq!(state, BallotState::Spoiled);
        }
        other => panic!("expected AlreadyFinalized, got {:?}", other.map(|_| ())),
    }
    assert_eq!(
        ballot_box.get("ballot-1").unwrap().state,
        BallotState::Spoiled
    );
}

#[test]
fn challenge_round_trip_matches_original_marking() {
    let election = Election::initialize(example_config(2, 2)).unwrap();

    let ballot = election
        .mark_ballot("style-1", &vote_for("candidate-brook"))
        .unwrap();
    let receipt = election.submit_ballot(&ballot, BallotAction::Spoil).unwrap();

    let challenged = election
        .challenge_ballot(&receipt.verification_code)
        .unwrap()
        .expect("spoiled ballot should be challengeable");

    assert_eq!(
        challenged.tally_of("contest-mayor", "selection-brook"),
        Some(1)
    );
    assert_eq!(
        challenged.tally_of("contest-mayor", "selection-ashe"),
        Some(0)
    );
}

#[test]
fn challenge_of_cast_ballot_returns_empty() {
    let election = Election::initialize(example_config(2, 2)).unwrap();

    let ballot = election
        .mark_ballot("style-1", &vote_for("candidate-ashe"))
        .unwrap();
    let receipt = election.submit_ballot(&ballot, BallotAction::Cast).unwrap();

    // A CAST ballot must not be decryptable through the challenge path.
    assert!(election
        .challenge_ballot(&receipt.verification_code)
        .unwrap()
        .is_none());

    // Nor an unknown verification code.
    assert!(election.challenge_ballot("no-such-code").unwrap().is_none());
}

#[test]
fn any_quorum_subset_decrypts_the_tally() {
    let (guardians, context) = ceremony_by_hand(3, 2);

    let device = EncryptionDevice::new(generate_device_uuid(), 1234, "test-device");
    let mut encryption = EncryptionMediator::new(context.clone(), device);

    let mut tally = CiphertextTally::new("subset-tally", &context);
    for (object_id, candidate) in [("ballot-1", 0u64), ("ballot-2", 1)] {
        let plaintext = PlaintextBallot {
            object_id: object_id.to_owned(),
            style_id: "style-1".to_owned(),
            contests: vec![PlaintextContest {
                object_id: "contest-mayor".to_owned(),
                selections: vec![
                    PlaintextSelection {
                        object_id: "selection-ashe".to_owned(),
                        vote: 1 - candidate,
                    },
                    PlaintextSelection {
                        object_id: "selection-brook".to_owned(),
                        vote: candidate,
                    },
                ],
            }],
        };
        tally.append(&encryption.encrypt(&plaintext).unwrap()).unwrap();
    }

    for subset in [[0usize, 1], [0, 2], [1, 2]] {
        let mut mediator = DecryptionMediator::new("subset-decryption", context.clone());
        for &index in &subset {
            let guardian = &guardians[index];
            let share = guardian.compute_tally_share(&tally).unwrap();
            mediator
                .announce(guardian.share_public_keys(), Some(share), BTreeMap::new())
                .unwrap();
        }

        let plaintext = mediator.get_plaintext_tally(&tally).unwrap();
        assert_eq!(plaintext.tally_of("contest-mayor", "selection-ashe"), Some(1));
        assert_eq!(plaintext.tally_of("contest-mayor", "selection-brook"), Some(1));
    }
}

#[test]
fn below_quorum_decryption_fails() {
    let (guardians, context) = ceremony_by_hand(3, 2);

    let device = EncryptionDevice::new(generate_device_uuid(), 1234, "test-device");
    let mut encryption = EncryptionMediator::new(context.clone(), device);

    let plaintext = PlaintextBallot {
        object_id: "ballot-1".to_owned(),
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
    };
    let mut tally = CiphertextTally::new("below-quorum-tally", &context);
    tally.append(&encryption.encrypt(&plaintext).unwrap()).unwrap();

    let mut mediator = DecryptionMediator::new("below-quorum-decryption", context.clone());
    let guardian = &guardians[0];
    let share = guardian.compute_tally_share(&tally).unwrap();
    mediator
        .announce(guardian.share_public_keys(), Some(share), BTreeMap::new())
        .unwrap();

    match mediator.get_plaintext_tally(&tally) {
        Err(Error::InsufficientShares {
            required,
            announced,
        }) => {
            assert_eq!(required, 2);
            assert_eq!(announced, 1);
        }
        other => panic!(
            "expected InsufficientShares, got {:?}",
            other.map(|_| ())
        ),
    }

    // A duplicate announcement from the same guardian overwrites; it
    // must not be double-counted toward the quorum.
    let share = guardian.compute_tally_share(&tally).unwrap();
    mediator
        .announce(guardian.share_public_keys(), Some(share), BTreeMap::new())
        .unwrap();
    assert_eq!(mediator.announced_count(), 1);
    assert!(matches!(
        mediator.get_plaintext_tally(&tally),
        Err(Error::InsufficientShares { .. })
    ));
}

#[test]
fn corrupted_backup_fails_the_ceremony() {
    let details = CeremonyDetails::new(2, 2).unwrap();
    let mut alice = Guardian::new("guardian-01", 1, details);
    let mut bob = Guardian::new("guardian-02", 2, details);
    let mut mediator = KeyCeremonyMediator::new("corrupt-ceremony", details);

    mediator.announce(alice.share_public_keys()).unwrap();
    mediator.announce(bob.share_public_keys()).unwrap();
    for keys in mediator.share_announced(1).unwrap() {
        alice.save_guardian_public_keys(keys);
    }
    for keys in mediator.share_announced(2).unwrap() {
        bob.save_guardian_public_keys(keys);
    }

    // Alice's backup for Bob is corrupted in flight.
    let mut alice_backups = alice.generate_partial_key_backups().unwrap();
    let last = alice_backups[0].encrypted_coordinate.len() - 1;
    alice_backups[0].encrypted_coordinate[last] ^= 0xff;
    mediator.receive_backups(1, alice_backups).unwrap();
    mediator
        .receive_backups(2, bob.generate_partial_key_backups().unwrap())
        .unwrap();

    for backup in mediator.share_backups(1).unwrap() {
        alice.save_partial_key_backup(backup);
    }
    for backup in mediator.share_backups(2).unwrap() {
        bob.save_partial_key_backup(backup);
    }

    let alice_verifications = vec![alice.verify_partial_key_backup(2).unwrap()];
    let bob_verifications = vec![bob.verify_partial_key_backup(1).unwrap()];
    mediator
        .receive_backup_verifications(alice_verifications)
        .unwrap();
    mediator
        .receive_backup_verifications(bob_verifications)
        .unwrap();

    // Publication names the exact (verifier, subject) pair.
    match mediator.publish_joint_key() {
        Err(Error::CeremonyVerificationFailed { verifier, subject }) => {
            assert_eq!(verifier, "guardian-02");
            assert_eq!(subject, "guardian-01");
        }
        other => panic!(
            "expected CeremonyVerificationFailed, got {:?}",
            other.map(|_| ())
        ),
    }
}

#[test]
fn single_guardian_election() {
    let election = Election::initialize(example_config(1, 1)).unwrap();

    let ballot = election
        .mark_ballot("style-1", &vote_for("candidate-ashe"))
        .unwrap();
    election.submit_ballot(&ballot, BallotAction::Cast).unwrap();

    let tally = election.get_election_tally().unwrap();
    assert_eq!(tally.tally_of("contest-mayor", "selection-ashe"), Some(1));
    assert_eq!(tally.tally_of("contest-mayor", "selection-brook"), Some(0));
}

#[test]
fn invalid_ceremony_details_fail_initialization() {
    assert!(matches!(
        Election::initialize(example_config(2, 3)),
        Err(Error::InvalidCeremonyDetails { .. })
    ));
}

#[test]
fn unknown_candidate_fails_marking() {
    let election = Election::initialize(example_config(2, 2)).unwrap();

    assert!(matches!(
        election.mark_ballot("style-1", &vote_for("candidate-ghost")),
        Err(Error::InvalidSelection { .. })
    ));
    assert!(matches!(
        election.mark_ballot("style-9", &vote_for("candidate-ashe")),
        Err(Error::BallotStyleNotFound(_))
    ));
}

#[test]
fn audit_log_records_received_and_counted_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = example_config(2, 2);
    config.storage_dir = Some(dir.path().to_path_buf());
    let election = Election::initialize(config).unwrap();

    let cast = election
        .mark_ballot("style-1", &vote_for("candidate-ashe"))
        .unwrap();
    election.submit_ballot(&cast, BallotAction::Cast).unwrap();

    let spoiled = election
        .mark_ballot("style-1", &vote_for("candidate-brook"))
        .unwrap();
    election.submit_ballot(&spoiled, BallotAction::Spoil).unwrap();

    let received = std::fs::read_to_string(dir.path().join("received.log")).unwrap();
    assert_eq!(received.lines().count(), 2);

    // Only the cast ballot is counted.
    let counted = std::fs::read_to_string(dir.path().join("counted.log")).unwrap();
    assert_eq!(counted.lines().count(), 1);
}

#[test]
fn concurrent_submissions_serialize_per_ballot() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let (_, context) = ceremony_by_hand(2, 2);
    let device = EncryptionDevice::new(generate_device_uuid(), 1234, "test-device");
    let mut encryption = EncryptionMediator::new(context, device);

    let plaintext = PlaintextBallot {
        object_id: "ballot-contended".to_owned(),
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
    };
    let encrypted = encryption.encrypt(&plaintext).unwrap();

    let ballot_box = Arc::new(BallotBox::new());
    let wins = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ballot_box = ballot_box.clone();
            let wins = wins.clone();
            let encrypted = encrypted.clone();
            std::thread::spawn(move || {
                let result = if i % 2 == 0 {
                    ballot_box.cast(encrypted)
                } else {
                    ballot_box.spoil(encrypted)
                };
                if result.is_ok() {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Exactly one submission wins; everyone else observed
    // AlreadyFinalized.
    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert_eq!(ballot_box.len(), 1);
}
