use ballotguard::*;
use clap::{App, Arg, SubCommand};
use std::collections::BTreeMap;

fn main() {
    env_logger::init();

    let matches = App::new("BallotGuard CLI")
        .version("0.1")
        .about("Runs a demonstration end-to-end verifiable election")
        .subcommand(
            SubCommand::with_name("e2e")
                .about("Run a complete election: key ceremony, ballots, tally, challenge")
                .arg(
                    Arg::with_name("MANIFEST")
                        .index(1)
                        .required(true)
                        .help("Election manifest in JSON format"),
                )
                .arg(
                    Arg::with_name("guardians")
                        .long("guardians")
                        .takes_value(true)
                        .help("Number of guardians (default 2)"),
                )
                .arg(
                    Arg::with_name("quorum")
                        .long("quorum")
                        .takes_value(true)
                        .help("Quorum of guardians required to decrypt (default 2)"),
                )
                .arg(
                    Arg::with_name("ballots")
                        .long("ballots")
                        .takes_value(true)
                        .help("Number of ballots to cast (default 5)"),
                ),
        )
        .get_matches();

    if let Some(matches) = matches.subcommand_matches("e2e") {
        command_e2e(matches);
    }
}

fn command_e2e(matches: &clap::ArgMatches) {
    let manifest_path = matches.value_of("MANIFEST").unwrap();
    let manifest = Manifest::from_file(manifest_path).unwrap_or_else(|e| {
        eprintln!("ballotguard e2e: unable to read {}: {}", manifest_path, e);
        std::process::exit(1);
    });

    let number_of_guardians = parse_arg(matches, "guardians", 2);
    let quorum = parse_arg(matches, "quorum", 2);
    let num_ballots = parse_arg(matches, "ballots", 5) as usize;

    let config = ElectionConfig {
        name: "ballotguard-e2e".to_owned(),
        number_of_guardians,
        quorum,
        launch_code: 1234,
        manifest,
        storage_dir: None,
    };

    let election = Election::initialize(config).unwrap_or_else(|e| {
        eprintln!("ballotguard e2e: failed to initialize election: {}", e);
        std::process::exit(1);
    });
    println!(
        "> Key ceremony complete ({} guardians, quorum {})",
        number_of_guardians, quorum
    );

    let style_id = election.context().manifest.ballot_styles[0].object_id.clone();
    let info = election.ballot_info(&style_id).unwrap_or_else(|e| {
        eprintln!("ballotguard e2e: {}", e);
        std::process::exit(1);
    });

    // Cast ballots, rotating through each contest's candidates.
    for i in 0..num_ballots {
        let mut selections = BTreeMap::new();
        for contest in &info.contests {
            let candidate = &contest.candidates[i % contest.candidates.len()];
            selections.insert(contest.object_id.clone(), candidate.object_id.clone());
        }

        let ballot = election.mark_ballot(&style_id, &selections).unwrap();
        let receipt = election.submit_ballot(&ballot, BallotAction::Cast).unwrap();
        println!("> Cast ballot {} ({})", i + 1, receipt.verification_code);
    }

    // Spoil one more and challenge it.
    let mut selections = BTreeMap::new();
    for contest in &info.contests {
        selections.insert(
            contest.object_id.clone(),
            contest.candidates[0].object_id.clone(),
        );
    }
    let spoiled = election.mark_ballot(&style_id, &selections).unwrap();
    let receipt = election.submit_ballot(&spoiled, BallotAction::Spoil).unwrap();
    println!("> Spoiled ballot ({})", receipt.verification_code);

    println!("Tally:");
    let tally = election.get_election_tally().unwrap_or_else(|e| {
        eprintln!("ballotguard e2e: tally failed: {}", e);
        std::process::exit(1);
    });
    for contest in tally.contests.values() {
        println!("  {}:", contest.object_id);
        for selection in contest.selections.values() {
            println!("    {} got {} votes", selection.object_id, selection.tally);
        }
    }

    println!("Challenge:");
    match election.challenge_ballot(&receipt.verification_code) {
        Ok(Some(challenged)) => {
            for contest in challenged.contests.values() {
                for selection in contest.selections.values() {
                    if selection.tally > 0 {
                        println!("  {} -> {}", contest.object_id, selection.object_id);
                    }
                }
            }
        }
        Ok(None) => println!("  ballot not found or not spoiled"),
        Err(e) => {
            eprintln!("ballotguard e2e: challenge failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn parse_arg(matches: &clap::ArgMatches, name: &str, default: u32) -> u32 {
    match matches.value_of(name) {
        Some(value) => value.parse().unwrap_or_else(|_| {
            eprintln!("ballotguard e2e: invalid value for --{}: {}", name, value);
            std::process::exit(1);
        }),
        None => default,
    }
}
