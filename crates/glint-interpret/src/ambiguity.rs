use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MAX_SUGGESTIONS: usize = 5;

const TRIGGER_PHRASES: &[&str] = &[
    "did you mean",
    "do you mean",
    "i'm not sure what you're asking",
    "i'm not sure what you mean",
    "i am not sure what you mean",
    "could you clarify",
    "can you clarify",
    "please clarify",
    "could you be more specific",
    "can you be more specific",
    "which one do you mean",
    "which one would you like",
];

lazy_static! {
    static ref NUMBERED_ITEM: Regex = Regex::new(r"(?m)^\s*\d+[.)]\s+(.+?)\s*$").unwrap();
    static ref BULLET_ITEM: Regex = Regex::new(r"(?m)^\s*•\s*(.+?)\s*$").unwrap();
    static ref DASH_ITEM: Regex = Regex::new(r"(?m)^\s*-\s+(.+?)\s*$").unwrap();
    static ref ASTERISK_ITEM: Regex = Regex::new(r"(?m)^\s*\*\s+(.+?)\s*$").unwrap();
    static ref DID_YOU_MEAN: Regex =
        Regex::new(r"(?i)did you mean\s+(.+?)\s+or\s+([^?.!\n]+)").unwrap();
}

/// The model asked for clarification instead of acting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ambiguity {
    pub trigger: String,
    pub suggestions: Vec<String>,
}

/// Recognise a clarifying question and pull out the offered options
pub fn detect_ambiguity(text: &str) -> Option<Ambiguity> {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    let trigger = TRIGGER_PHRASES
        .iter()
        .find(|phrase| lowered.contains(*phrase))?;

    Some(Ambiguity {
        trigger: trigger.to_string(),
        suggestions: suggestions(text),
    })
}

fn suggestions(text: &str) -> Vec<String> {
    let listed = [&*NUMBERED_ITEM, &*BULLET_ITEM, &*DASH_ITEM, &*ASTERISK_ITEM]
        .iter()
        .map(|re| list_items(re, text))
        .find(|items| !items.is_empty());

    let mut found = listed.unwrap_or_else(|| did_you_mean(text));
    found.truncate(MAX_SUGGESTIONS);
    found
}

fn list_items(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .map(|caps| clean(&caps[1]))
        .filter(|item| !item.is_empty())
        .collect()
}

/// "Did you mean A, B or C?" split into its alternatives
fn did_you_mean(text: &str) -> Vec<String> {
    let Some(caps) = DID_YOU_MEAN.captures(text) else {
        return Vec::new();
    };

    caps[1]
        .split(',')
        .chain(std::iter::once(&caps[2]))
        .map(clean)
        .filter(|item| !item.is_empty())
        .collect()
}

fn clean(item: &str) -> String {
    item.trim()
        .trim_end_matches(['?', '.', '!', ','])
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '`')
        .trim()
        .to_string()
}
