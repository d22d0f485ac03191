//! Tool-related types for the protocol

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Arguments of a function call, in the order the model produced them
pub type Arguments = Map<String, Value>;

/// JSON Schema for a tool's parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl JsonSchema {
    fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description: None,
            properties: None,
            required: None,
            extra: HashMap::new(),
        }
    }

    pub fn object() -> Self {
        Self {
            properties: Some(serde_json::json!({})),
            ..Self::typed("object")
        }
    }

    pub fn string() -> Self {
        Self::typed("string")
    }

    pub fn number() -> Self {
        Self::typed("number")
    }

    pub fn integer() -> Self {
        Self::typed("integer")
    }

    pub fn boolean() -> Self {
        Self::typed("boolean")
    }

    pub fn array(items: JsonSchema) -> Self {
        let mut schema = Self::typed("array");
        schema
            .extra
            .insert("items".to_string(), serde_json::to_value(items).unwrap_or_default());
        schema
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict a string schema to a fixed set of values
    pub fn enum_values(mut self, values: &[&str]) -> Self {
        self.extra.insert(
            "enum".to_string(),
            Value::Array(values.iter().map(|v| Value::String(v.to_string())).collect()),
        );
        self
    }

    pub fn property(mut self, name: &str, schema: JsonSchema) -> Self {
        let props = self.properties.get_or_insert(serde_json::json!({}));
        if let Some(obj) = props.as_object_mut() {
            obj.insert(
                name.to_string(),
                serde_json::to_value(schema).unwrap_or_default(),
            );
        }
        self
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn required(mut self, fields: &[&str]) -> Self {
        self.required = Some(fields.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn property_names(&self) -> BTreeSet<String> {
        self.properties
            .as_ref()
            .and_then(Value::as_object)
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn required_fields(&self) -> BTreeSet<String> {
        self.required
            .as_ref()
            .map(|fields| fields.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Declared properties that are not required
    pub fn optional_fields(&self) -> BTreeSet<String> {
        let required = self.required_fields();
        self.property_names()
            .into_iter()
            .filter(|name| !required.contains(name))
            .collect()
    }
}

/// A tool as advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: JsonSchema,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: JsonSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// OpenAI `tools` entry
    pub fn to_openai(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    /// Anthropic `tools` entry
    pub fn to_anthropic(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters,
        })
    }
}

/// A function call with parsed arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool invocation.
///
/// Any JSON object is a valid result. It counts as a failure when it carries
/// an `error` key or `success: false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolResult(pub Map<String, Value>);

impl ToolResult {
    pub fn success() -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(true));
        Self(map)
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(false));
        map.insert("error".to_string(), Value::String(message.into()));
        Self(map)
    }

    /// Wrap a handler's raw return value; non-objects land under `result`
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                Self(map)
            }
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_success(&self) -> bool {
        !self.0.contains_key("error") && self.0.get("success") != Some(&Value::Bool(false))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Human-readable failure text, when the result is a failure
    pub fn error_message(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        match self.0.get("error") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(other) => Some(other.to_string()),
            None => Some("tool reported success: false".to_string()),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
