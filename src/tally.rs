use log::{debug, info, warn};

use weighted_voting::*;

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use text_diff::print_diff;

pub mod config_reader;
pub mod summary;

use crate::tally::config_reader::*;
use crate::tally::summary::build_summary_js;

#[derive(Debug, Snafu)]
pub enum TallyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Voting error: {source}"))]
    Voting { source: VotingError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TallyResult<T> = Result<T, TallyError>;

/// Assembles the event from the parsed configuration: groups, questions,
/// choices and the procuration edges (confirmed where the file says so).
pub fn build_event(config: &TallyConfig) -> TallyResult<EventState> {
    let rule = validate_rule(&config.event.rule)?;
    let name = config.output_settings.event_name.clone();
    let setup = EventSetup {
        slug: config.event.slug.clone().unwrap_or_else(|| name.clone()),
        name,
        rule,
        quorum: config.event.quorum.unwrap_or(EventSetup::DEFAULT_QUORUM),
        groups: config
            .event
            .groups
            .iter()
            .map(|g| GroupSetup {
                name: g.name.clone(),
                weight: g.weight,
                members: g
                    .members
                    .iter()
                    .map(|m| Member {
                        username: m.username.clone(),
                        last_name: m.last_name.clone().unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect(),
        questions: config
            .event
            .questions
            .iter()
            .map(|q| QuestionSetup {
                number: q.number,
                text: q.text.clone(),
            })
            .collect(),
        choices: config
            .event
            .choices
            .iter()
            .map(|c| ChoiceSetup {
                number: c.number,
                text: c.text.clone(),
            })
            .collect(),
    };

    let mut event = EventState::new(&setup).context(VotingSnafu {})?;
    for proc in config.procurations.iter() {
        event.delegate(&proc.from, &proc.to).context(VotingSnafu {})?;
        if proc.confirmed.unwrap_or(false) {
            event
                .confirm_procuration(&proc.to, &proc.from)
                .context(VotingSnafu {})?;
        }
    }
    Ok(event)
}

/// Starts the event, applies the ballots in file order and aggregates every
/// question. A ballot that overspends an allowance aborts the tabulation.
pub fn tabulate(
    event: &mut EventState,
    ballots: &[BallotConfig],
) -> TallyResult<Vec<QuestionTally>> {
    event.start().context(VotingSnafu {})?;
    for ballot in ballots.iter() {
        event
            .cast_ballot(&ballot.member, ballot.question, &ballot.choices)
            .context(VotingSnafu {})?;
    }

    let question_nos: Vec<u32> = event.questions().iter().map(|q| q.number).collect();
    let mut tallies: Vec<QuestionTally> = Vec::new();
    for no in question_nos {
        tallies.push(event.results(no).context(VotingSnafu {})?);
    }
    info!("tabulate: {} questions aggregated", tallies.len());
    Ok(tallies)
}

pub fn run_tally(
    config_path: String,
    out_path: Option<String>,
    reference_path: Option<String>,
) -> TallyResult<()> {
    let config = read_config(&config_path)?;
    info!("config: {:?}", config);

    let mut event = build_event(&config)?;
    debug!(
        "run_tally: event {} with {} ballots to apply",
        event.slug(),
        config.ballots.len()
    );
    let tallies = tabulate(&mut event, &config.ballots)?;

    let result_js = build_summary_js(&config, &event, &tallies)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match summary_destination(&config_path, &config, &out_path) {
        Some(path) => {
            fs::write(&path, &pretty_js_stats).context(WritingSummarySnafu { path: path.clone() })?;
            info!("run_tally: summary written to {}", path);
        }
        None => {
            println!("{}", pretty_js_stats);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = reference_path {
        let summary_ref = read_summary(&summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

// The --out flag wins over the output directory of the configuration file.
// 'stdout' (or nothing at all) prints to the standard output.
fn summary_destination(
    config_path: &str,
    config: &TallyConfig,
    out_path: &Option<String>,
) -> Option<String> {
    match out_path.as_deref() {
        Some("stdout") => None,
        Some(p) => Some(p.to_string()),
        None => config.output_settings.output_directory.as_ref().map(|dir| {
            let root = Path::new(config_path).parent().unwrap_or_else(|| Path::new("."));
            let p: PathBuf = [root, Path::new(dir), Path::new("summary.json")]
                .iter()
                .collect();
            p.as_path().display().to_string()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The reference event: two weighted groups, two questions, two choices,
    // with the vote distribution used by the original test suite.
    const REFERENCE_CONFIG: &str = r#"
    {
      "outputSettings": {
        "eventName": "Assemblée générale",
        "company": "Société de test",
        "eventDate": "2021-05-12"
      },
      "event": {
        "slug": "assemblee-generale",
        "rule": "MAJ",
        "quorum": 33,
        "groups": [
          {
            "name": "Groupe 1",
            "weight": 30,
            "members": [
              { "username": "user11", "lastName": "Martin" },
              { "username": "user12", "lastName": "Bernard" },
              { "username": "user13", "lastName": "Dubois" },
              { "username": "user14", "lastName": "Thomas" }
            ]
          },
          {
            "name": "Groupe 2",
            "weight": 70,
            "members": [
              { "username": "user21", "lastName": "Robert" },
              { "username": "user22", "lastName": "Richard" }
            ]
          }
        ],
        "questions": [
          { "number": 1, "text": "Question 1" },
          { "number": 2, "text": "Question 2" }
        ],
        "choices": [
          { "number": 1, "text": "Choix 1" },
          { "number": 2, "text": "Choix 2" }
        ]
      },
      "procurations": [],
      "ballots": [
        { "member": "user11", "question": 1, "choices": [1] },
        { "member": "user12", "question": 1, "choices": [1] },
        { "member": "user13", "question": 1, "choices": [1] },
        { "member": "user14", "question": 1, "choices": [2] },
        { "member": "user21", "question": 1, "choices": [2] },
        { "member": "user22", "question": 1, "choices": [2] },
        { "member": "user11", "question": 2, "choices": [1] },
        { "member": "user12", "question": 2, "choices": [2] },
        { "member": "user13", "question": 2, "choices": [2] },
        { "member": "user14", "question": 2, "choices": [2] },
        { "member": "user21", "question": 2, "choices": [2] },
        { "member": "user22", "question": 2, "choices": [2] }
      ]
    }
    "#;

    fn reference_config(rule: &str) -> TallyConfig {
        let mut config: TallyConfig = serde_json::from_str(REFERENCE_CONFIG).unwrap();
        config.event.rule = rule.to_string();
        config
    }

    fn totals_of(tally: &QuestionTally) -> Vec<(&str, f64)> {
        tally
            .totals
            .iter()
            .map(|(label, value)| (label.as_str(), *value))
            .collect()
    }

    #[test]
    fn reference_event_majority() {
        let config = reference_config("MAJ");
        let mut event = build_event(&config).unwrap();
        let tallies = tabulate(&mut event, &config.ballots).unwrap();

        assert_eq!(totals_of(&tallies[0]), vec![("Choix 1", 30.0), ("Choix 2", 70.0)]);
        assert_eq!(totals_of(&tallies[1]), vec![("Choix 1", 0.0), ("Choix 2", 100.0)]);
    }

    #[test]
    fn reference_event_proportional() {
        let config = reference_config("PROP");
        let mut event = build_event(&config).unwrap();
        let tallies = tabulate(&mut event, &config.ballots).unwrap();

        assert_eq!(
            totals_of(&tallies[0]),
            vec![("Choix 1", 34.62), ("Choix 2", 65.38)]
        );
        assert_eq!(
            totals_of(&tallies[1]),
            vec![("Choix 1", 11.54), ("Choix 2", 88.46)]
        );
    }

    #[test]
    fn procurations_shift_allowances() {
        let mut config = reference_config("MAJ");
        config.procurations = vec![ProcurationConfig {
            from: "user12".to_string(),
            to: "user11".to_string(),
            confirmed: Some(true),
        }];
        // user12 can no longer vote himself.
        config.ballots.retain(|b| b.member != "user12");

        let mut event = build_event(&config).unwrap();
        event.start().unwrap();
        assert_eq!(event.ballot_status("user12", 1).unwrap().remaining_votes, 0);
        assert_eq!(event.ballot_status("user11", 1).unwrap().remaining_votes, 2);
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let config = reference_config("IRV");
        assert!(build_event(&config).is_err());
    }

    #[test]
    fn overspent_ballot_aborts_tabulation() {
        let mut config = reference_config("MAJ");
        config.ballots.push(BallotConfig {
            member: "user11".to_string(),
            question: 1,
            choices: vec![1],
        });
        let mut event = build_event(&config).unwrap();
        let res = tabulate(&mut event, &config.ballots);
        assert!(matches!(res, Err(TallyError::Voting { .. })));
    }

    #[test]
    fn summary_shape() {
        let config = reference_config("MAJ");
        let mut event = build_event(&config).unwrap();
        let tallies = tabulate(&mut event, &config.ballots).unwrap();
        let js = build_summary_js(&config, &event, &tallies).unwrap();

        assert_eq!(js["config"]["event"], "Assemblée générale");
        assert_eq!(js["config"]["rule"], "MAJ");
        assert_eq!(js["results"][0]["question"], 1);
        assert_eq!(js["results"][0]["tally"]["Choix 1"], 30);
        assert_eq!(js["results"][0]["tally"]["Choix 2"], 70);
        assert_eq!(js["results"][0]["votesCast"], 6);
        assert_eq!(js["results"][0]["quorumReached"], true);
        assert_eq!(js["results"][0]["groups"][0]["group"], "Groupe 1");
        assert_eq!(js["results"][0]["groups"][0]["weight"], 30);
        assert_eq!(js["results"][0]["groups"][0]["votes"], serde_json::json!([3, 1]));
    }

    #[test]
    fn summary_keeps_decimals_under_prop() {
        let config = reference_config("PROP");
        let mut event = build_event(&config).unwrap();
        let tallies = tabulate(&mut event, &config.ballots).unwrap();
        let js = build_summary_js(&config, &event, &tallies).unwrap();

        assert_eq!(js["results"][0]["tally"]["Choix 1"], 34.62);
        assert_eq!(js["results"][1]["tally"]["Choix 2"], 88.46);
    }

    #[test]
    fn out_flag_wins_over_config_directory() {
        let mut config = reference_config("MAJ");
        config.output_settings.output_directory = Some("out".to_string());

        let dest = summary_destination("/data/event.json", &config, &None);
        assert_eq!(dest, Some("/data/out/summary.json".to_string()));
        let dest = summary_destination("/data/event.json", &config, &Some("here.json".to_string()));
        assert_eq!(dest, Some("here.json".to_string()));
        let dest = summary_destination("/data/event.json", &config, &Some("stdout".to_string()));
        assert_eq!(dest, None);
    }
}
