//! Provider-independent response shape

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Arguments, FunctionCall, Usage};

/// A model reply normalized to the OpenAI chat-completion layout.
///
/// Every provider client produces this; downstream code never sees a
/// backend's wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChoiceMessage>,
    /// Legacy completion text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<RawFunctionCall>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A native function call as the backend delivered it, arguments unparsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed arguments for {name}: {message}")]
pub struct ArgumentParseError {
    pub name: String,
    pub message: String,
}

impl RawFunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the argument string; blank means no arguments, anything but an
    /// object is rejected
    pub fn parse(&self) -> Result<FunctionCall, ArgumentParseError> {
        let raw = self.arguments.trim();
        if raw.is_empty() {
            return Ok(FunctionCall::new(self.name.clone(), Arguments::new()));
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(arguments)) => Ok(FunctionCall::new(self.name.clone(), arguments)),
            Ok(other) => Err(ArgumentParseError {
                name: self.name.clone(),
                message: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
            Err(e) => Err(ArgumentParseError {
                name: self.name.clone(),
                message: e.to_string(),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl NormalizedResponse {
    /// Single assistant choice, the shape every client emits
    pub fn assistant(
        id: impl Into<String>,
        model: impl Into<String>,
        content: Option<String>,
        function_call: Option<RawFunctionCall>,
        finish_reason: Option<String>,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: Some(ChoiceMessage {
                    role: "assistant".to_string(),
                    content,
                    function_call,
                }),
                text: None,
                delta: None,
                finish_reason,
            }],
            usage: Some(usage),
        }
    }

    pub fn first_choice(&self) -> Option<&Choice> {
        self.choices.first()
    }

    pub fn function_call(&self) -> Option<&RawFunctionCall> {
        self.first_choice()?.message.as_ref()?.function_call.as_ref()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.first_choice()?.finish_reason.as_deref()
    }

    pub fn total_tokens(&self) -> u64 {
        self.usage.map(|u| u.total_tokens).unwrap_or(0)
    }
}
