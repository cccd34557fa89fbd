use std::fs;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;

use weighted_voting::ElectoralRule;

use crate::tally::{OpeningJsonSnafu, ParsingJsonSnafu, TallyResult};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "eventDate")]
    pub event_date: Option<String>,
    pub company: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    pub username: String,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub weight: u32,
    pub members: Vec<MemberConfig>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConfig {
    pub number: u32,
    pub text: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceConfig {
    pub number: u32,
    pub text: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub slug: Option<String>,
    /// "MAJ" or "PROP".
    pub rule: String,
    pub quorum: Option<u32>,
    pub groups: Vec<GroupConfig>,
    pub questions: Vec<QuestionConfig>,
    pub choices: Vec<ChoiceConfig>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ProcurationConfig {
    pub from: String,
    pub to: String,
    pub confirmed: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotConfig {
    pub member: String,
    pub question: u32,
    pub choices: Vec<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub event: EventConfig,
    #[serde(default)]
    pub procurations: Vec<ProcurationConfig>,
    #[serde(default)]
    pub ballots: Vec<BallotConfig>,
}

pub fn read_config(path: &str) -> TallyResult<TallyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu {
        path: path.to_string(),
    })?;
    debug!("read_config: read {} bytes from {}", contents.len(), path);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

pub fn read_summary(path: &str) -> TallyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu {
        path: path.to_string(),
    })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_summary: {:?}", js);
    Ok(js)
}

pub fn validate_rule(rule: &str) -> TallyResult<ElectoralRule> {
    match rule {
        "MAJ" => Ok(ElectoralRule::Majority),
        "PROP" => Ok(ElectoralRule::Proportional),
        x => {
            whatever!("Unknown electoral rule {:?} (expected MAJ or PROP)", x)
        }
    }
}
