// Assembles the JSON summary of a tabulated event.

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use weighted_voting::{EventState, QuestionTally};

use crate::tally::config_reader::TallyConfig;
use crate::tally::{TallyResult, VotingSnafu};

// Echo of the configuration, written at the head of the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub event: String,
    pub company: Option<String>,
    pub date: Option<String>,
    pub rule: String,
    pub quorum: u32,
}

pub fn build_summary_js(
    config: &TallyConfig,
    event: &EventState,
    tallies: &[QuestionTally],
) -> TallyResult<JSValue> {
    let c = OutputConfig {
        event: config.output_settings.event_name.clone(),
        company: config.output_settings.company.clone(),
        date: config.output_settings.event_date.clone(),
        rule: config.event.rule.clone(),
        quorum: event.quorum(),
    };

    let mut results: Vec<JSValue> = Vec::new();
    for question_tally in tallies.iter() {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (label, value) in question_tally.totals.iter() {
            tally.insert(label.clone(), tally_value(*value));
        }
        let votes_cast = event
            .votes_cast(question_tally.question_no)
            .context(VotingSnafu {})?;
        let quorum_reached = event
            .quorum_reached(question_tally.question_no)
            .context(VotingSnafu {})?;
        let groups: Vec<JSValue> = event
            .group_tallies(question_tally.question_no)
            .context(VotingSnafu {})?
            .iter()
            .map(|g| {
                json!({
                    "group": g.group,
                    "weight": g.weight,
                    "votes": g.votes,
                })
            })
            .collect();
        results.push(json!({
            "question": question_tally.question_no,
            "text": question_tally.question_text,
            "tally": tally,
            "groups": groups,
            "votesCast": votes_cast,
            "quorumReached": quorum_reached,
        }));
    }

    Ok(json!({
        "config": c,
        "results": results,
    }))
}

// Majority totals are whole weights: keep them as integers in the output.
fn tally_value(value: f64) -> JSValue {
    if value.fract() == 0.0 && value >= 0.0 {
        json!(value as u64)
    } else {
        json!(value)
    }
}
