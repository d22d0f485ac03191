//! Repair of argument values mangled by the model
//!
//! Models sometimes echo the keyword into the value, producing
//! `{"word": "word=\"hi\""}` instead of `{"word": "hi"}`. Such values are
//! replaced with the quoted inner value before dispatch.

use glint_protocol::Arguments;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

lazy_static! {
    static ref KEYWORD_ASSIGNMENT: Regex =
        Regex::new(r#"^\s*[A-Za-z_][A-Za-z0-9_]*=(?:"([^"]*)"|'([^']*)')\s*$"#).unwrap();
}

/// Repair serialization artifacts in place; returns how many values changed
pub fn repair_arguments(arguments: &mut Arguments) -> usize {
    let mut repaired = 0;
    for (key, value) in arguments.iter_mut() {
        let Value::String(text) = value else {
            continue;
        };
        if let Some(inner) = repair_value(key, text) {
            debug!(key = %key, "Repaired keyword artifact in tool argument");
            *value = Value::String(inner);
            repaired += 1;
        }
    }
    repaired
}

fn repair_value(key: &str, text: &str) -> Option<String> {
    if let Some(caps) = KEYWORD_ASSIGNMENT.captures(text) {
        return caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string());
    }

    // The value's own key embedded somewhere inside, e.g. `color: color="red"`
    let needle = format!("{}=", key);
    let start = text.find(&needle)? + needle.len();
    let rest = &text[start..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}
