use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref ACTION_BLOCK: Regex = Regex::new(r"(?s)\[ACTION:(\w+)\](.*?)\[/ACTION\]").unwrap();
}

/// An `[ACTION:type]key=value...[/ACTION]` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    pub parameters: IndexMap<String, String>,
}

/// All action blocks in order of appearance.
///
/// Each non-empty line of a block is split at its first `=`; lines without
/// one are skipped.
pub fn parse_actions(text: &str) -> Vec<Action> {
    ACTION_BLOCK
        .captures_iter(text)
        .map(|caps| Action {
            action_type: caps[1].to_string(),
            parameters: caps[2]
                .lines()
                .filter_map(|line| line.split_once('='))
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .filter(|(key, _)| !key.is_empty())
                .collect(),
        })
        .collect()
}
