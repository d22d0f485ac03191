//! Color sequences written by the model as JSON or as timed lines

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref JSON_FENCE: Regex = Regex::new(r"```[A-Za-z]*[^\n]*\n([\s\S]*?)```").unwrap();
    static ref TIMED_LINE: Regex = Regex::new(
        r"(?m)^\s*(?:[-*•]\s*)?(\d{1,3}:\d{1,2}(?:\.\d+)?)\s*-\s*(\d{1,3}:\d{1,2}(?:\.\d+)?)\s*:\s*(.+?)\s*$"
    )
    .unwrap();
    static ref RGB_TRIPLE: Regex =
        Regex::new(r"^[\[(]\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*[\])]").unwrap();
}

/// A color as the model wrote it; names are resolved elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Rgb([u8; 3]),
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStep {
    pub start_time: f64,
    pub end_time: f64,
    pub color: ColorValue,
}

/// Find a color sequence in a reply.
///
/// JSON lists in code fences or bare brackets are tried first and the first
/// one that decodes wins. Otherwise timed lines like
/// `00:12.5-00:14: [255, 0, 0]` are collected.
pub fn parse_color_sequence(text: &str) -> Option<Vec<ColorStep>> {
    json_sequence(text).or_else(|| timed_lines(text))
}

fn json_sequence(text: &str) -> Option<Vec<ColorStep>> {
    let fenced = JSON_FENCE.captures_iter(text).map(|caps| caps[1].to_string());
    let bracketed = bracket_blocks(text).into_iter();

    fenced
        .chain(bracketed)
        .find_map(|candidate| decode_steps(candidate.trim()))
}

fn decode_steps(candidate: &str) -> Option<Vec<ColorStep>> {
    serde_json::from_str::<Vec<ColorStep>>(candidate)
        .ok()
        .filter(|steps| !steps.is_empty())
}

/// Balanced `[ { ... } ]` spans anywhere in the text
fn bracket_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    for (start, _) in text.match_indices('[') {
        let rest = text[start + 1..].trim_start();
        if !rest.starts_with('{') {
            continue;
        }
        if let Some(end) = closing_bracket(text, start) {
            blocks.push(text[start..=end].to_string());
        }
    }
    blocks
}

fn closing_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn timed_lines(text: &str) -> Option<Vec<ColorStep>> {
    let steps: Vec<ColorStep> = TIMED_LINE
        .captures_iter(text)
        .filter_map(|caps| {
            Some(ColorStep {
                start_time: parse_timestamp(&caps[1])?,
                end_time: parse_timestamp(&caps[2])?,
                color: parse_color(&caps[3]),
            })
        })
        .collect();

    (!steps.is_empty()).then_some(steps)
}

fn parse_color(raw: &str) -> ColorValue {
    if let Some(caps) = RGB_TRIPLE.captures(raw) {
        let channels: Option<Vec<u8>> = (1..=3).map(|i| caps[i].parse::<u8>().ok()).collect();
        if let Some([r, g, b]) = channels.as_deref() {
            return ColorValue::Rgb([*r, *g, *b]);
        }
    }

    let name = raw
        .trim()
        .trim_end_matches(['.', ',', ';'])
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim();
    ColorValue::Named(name.to_string())
}

/// Seconds from `MM:SS[.frac]`; a bare number is taken as seconds
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let seconds = match raw.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u32 = minutes.trim().parse().ok()?;
            let seconds: f64 = seconds.trim().parse().ok()?;
            if !(0.0..60.0).contains(&seconds) {
                return None;
            }
            f64::from(minutes) * 60.0 + seconds
        }
        None => raw.parse().ok()?,
    };
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}
