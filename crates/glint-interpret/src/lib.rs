//! Glint Interpret - reading structure out of model replies
//!
//! Everything here is a pure function over text. Malformed input degrades to
//! "nothing found"; no function in this crate panics or returns an error for
//! bad model output, with the single exception of a native call whose
//! arguments fail to decode (that is surfaced so it can be retried).

mod actions;
mod ambiguity;
mod args;
mod calls;
mod colors;
mod text;

pub use actions::{parse_actions, Action};
pub use ambiguity::{detect_ambiguity, Ambiguity, MAX_SUGGESTIONS};
pub use args::{coerce_literal, parse_call_arguments, split_top_level};
pub use calls::{
    extract_function_call, function_call, CallCascade, CallPattern, FencedBlockCall, GenericCall,
    SingleQuotedCodeCall, TripleQuotedCodeCall, CODE_EXECUTION_CALL,
};
pub use colors::{parse_color_sequence, parse_timestamp, ColorStep, ColorValue};
pub use text::extract_text;

use serde::{Deserialize, Serialize};

/// Structured data found in a plain-text reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<Ambiguity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_sequence: Option<Vec<ColorStep>>,
}

impl Interpretation {
    pub fn is_empty(&self) -> bool {
        self.ambiguity.is_none() && self.actions.is_empty() && self.color_sequence.is_none()
    }
}

/// Run every text parser over a reply
pub fn interpret(text: &str) -> Interpretation {
    Interpretation {
        ambiguity: detect_ambiguity(text),
        actions: parse_actions(text),
        color_sequence: parse_color_sequence(text),
    }
}
