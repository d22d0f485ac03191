//! Built-in choreography tools
//!
//! Each tool is a schema in the catalog plus a handler closure holding the
//! collaborators it talks to. Handlers are registered even when their
//! collaborator is absent; capability gating keeps them from being
//! advertised, and a direct call reports the missing capability.

mod analysis;
mod code;
mod color;
mod timeline;

pub use color::resolve_color;

use glint_protocol::{Arguments, JsonSchema, ToolDefinition};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{Capability, CapabilitySet, Collaborators, ToolError, ToolRegistry};

fn color_schema() -> JsonSchema {
    JsonSchema::array(JsonSchema::integer())
        .description("RGB color as [r, g, b] with components 0-255 (a color name is also accepted)")
}

fn segment_schema() -> JsonSchema {
    JsonSchema::object()
        .property(
            "ball",
            JsonSchema::integer().description("Zero-based ball index"),
        )
        .property(
            "start_time",
            JsonSchema::number().description("Start time in seconds"),
        )
        .property(
            "end_time",
            JsonSchema::number().description("End time in seconds"),
        )
        .property("color", color_schema())
        .required(&["ball", "start_time", "end_time", "color"])
}

/// Schemas of every built-in tool, in advertisement order
pub fn builtin_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "create_segment",
            "Color one ball for a time range",
            segment_schema(),
        ),
        ToolDefinition::new(
            "create_segments",
            "Create several segments at once",
            JsonSchema::object()
                .property("segments", JsonSchema::array(segment_schema()))
                .required(&["segments"]),
        ),
        ToolDefinition::new(
            "clear_timeline",
            "Remove every segment from a ball, or from all balls when no ball is given",
            JsonSchema::object().property(
                "ball",
                JsonSchema::integer().description("Zero-based ball index"),
            ),
        ),
        ToolDefinition::new(
            "list_timelines",
            "List every ball's timeline with its segments",
            JsonSchema::object(),
        ),
        ToolDefinition::new(
            "create_segment_for_word",
            "Light balls while a lyric word is sung, for every occurrence of the word",
            JsonSchema::object()
                .property("word", JsonSchema::string().description("Lyric word"))
                .property("color", color_schema())
                .property(
                    "balls",
                    JsonSchema::array(JsonSchema::integer())
                        .description("Ball indices to light; all balls when omitted"),
                )
                .required(&["word", "color"]),
        ),
        ToolDefinition::new(
            "get_beats",
            "Beat times in seconds within a range",
            JsonSchema::object()
                .property("start_time", JsonSchema::number())
                .property("end_time", JsonSchema::number())
                .property(
                    "type",
                    JsonSchema::string().enum_values(&["beat", "downbeat"]),
                ),
        ),
        ToolDefinition::new(
            "get_section",
            "Start and end of a song section such as verse or chorus",
            JsonSchema::object()
                .property("label", JsonSchema::string())
                .required(&["label"]),
        ),
        ToolDefinition::new(
            "get_feature_value",
            "Value of an audio feature (energy, loudness, ...) at a time",
            JsonSchema::object()
                .property("time", JsonSchema::number())
                .property("feature", JsonSchema::string())
                .required(&["time", "feature"]),
        ),
        ToolDefinition::new(
            code::CODE_TOOL,
            "Run sequence code in the sandbox; a `segments` list it leaves behind is added to the timelines",
            JsonSchema::object()
                .property("code", JsonSchema::string())
                .required(&["code"]),
        ),
    ]
}

/// Define and register every built-in tool against `collaborators`
pub fn register_builtin_tools(registry: &mut ToolRegistry, collaborators: &Collaborators) {
    for definition in builtin_definitions() {
        registry.define(definition);
    }

    let timeline = collaborators.timeline.clone();
    let analysis = collaborators.analysis.clone();
    let executor = collaborators.executor.clone();
    let needs_timeline = CapabilitySet::of(&[Capability::Timeline]);
    let needs_analysis = CapabilitySet::of(&[Capability::AudioAnalysis]);

    registry.register(
        "create_segment",
        needs_timeline.clone(),
        timeline::create_segment(timeline.clone()),
    );
    registry.register(
        "create_segments",
        needs_timeline.clone(),
        timeline::create_segments(timeline.clone()),
    );
    registry.register(
        "clear_timeline",
        needs_timeline.clone(),
        timeline::clear_timeline(timeline.clone()),
    );
    registry.register(
        "list_timelines",
        needs_timeline.clone(),
        timeline::list_timelines(timeline.clone()),
    );
    registry.register(
        "create_segment_for_word",
        needs_timeline.with(Capability::AudioAnalysis),
        timeline::create_segment_for_word(timeline.clone(), analysis.clone()),
    );
    registry.register(
        "get_beats",
        needs_analysis.clone(),
        analysis::get_beats(analysis.clone()),
    );
    registry.register(
        "get_section",
        needs_analysis.clone(),
        analysis::get_section(analysis.clone()),
    );
    registry.register(
        "get_feature_value",
        needs_analysis,
        analysis::get_feature_value(analysis.clone()),
    );
    registry.register(
        code::CODE_TOOL,
        CapabilitySet::of(&[Capability::CodeExecution]),
        code::execute_sequence_code(executor, timeline, analysis),
    );

    debug!(tools = registry.len(), "Registered built-in tools");
}

fn parse<T: DeserializeOwned>(arguments: Arguments) -> Result<T, ToolError> {
    Ok(serde_json::from_value(Value::Object(arguments))?)
}

fn require<T: ?Sized>(
    collaborator: Option<Arc<T>>,
    capability: Capability,
) -> Result<Arc<T>, ToolError> {
    collaborator.ok_or(ToolError::Unavailable { capability })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_definitions_are_unique_and_valid() {
        let definitions = builtin_definitions();
        let names: BTreeSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.len(), definitions.len());

        for definition in &definitions {
            assert_eq!(definition.parameters.schema_type, "object");
            let properties = definition.parameters.property_names();
            assert!(definition.parameters.required_fields().is_subset(&properties));
        }
    }

    #[test]
    fn test_registration_matches_catalog() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, &Collaborators::new());

        for definition in builtin_definitions() {
            assert!(registry.has_handler(&definition.name));
        }
        // Nothing is advertised without collaborators
        assert!(registry
            .available_definitions(&Collaborators::new().capabilities())
            .is_empty());
    }
}
