use glint_protocol::{Arguments, ToolResult};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::timeline::{apply_segment, Batch, SegmentArgs};
use super::{parse, require};
use crate::{AnalysisStore, Capability, CodeExecutor, TimelineStore, ToolError, ToolHandler};

pub(super) const CODE_TOOL: &str = "execute_sequence_code";

#[derive(Debug, Deserialize)]
struct CodeArgs {
    code: String,
}

/// Variables made available to sequence code
fn execution_context(
    timeline: Option<&dyn TimelineStore>,
    analysis: Option<&dyn AnalysisStore>,
) -> Map<String, Value> {
    let mut context = Map::new();
    if let Some(timeline) = timeline {
        context.insert("ball_count".into(), json!(timeline.timelines().len()));
    }
    if let Some(data) = analysis.and_then(|a| a.load_analysis()) {
        context.insert("duration".into(), json!(data.duration));
        context.insert("tempo".into(), json!(data.tempo));
        context.insert("beats".into(), json!(data.beats));
        context.insert("downbeats".into(), json!(data.downbeats));
        context.insert("sections".into(), json!(data.sections));
    }
    context
}

pub(super) fn execute_sequence_code(
    executor: Option<Arc<dyn CodeExecutor>>,
    timeline: Option<Arc<dyn TimelineStore>>,
    analysis: Option<Arc<dyn AnalysisStore>>,
) -> impl ToolHandler {
    move |arguments: Arguments| {
        let executor = executor.clone();
        let timeline = timeline.clone();
        let analysis = analysis.clone();
        async move {
            let executor = require(executor, Capability::CodeExecution)?;
            let args: CodeArgs = parse(arguments)?;
            if args.code.trim().is_empty() {
                return Err(ToolError::invalid("code is empty"));
            }

            let context = execution_context(timeline.as_deref(), analysis.as_deref());
            let outcome = executor.execute(&args.code, context).await;
            if !outcome.success {
                let kind = outcome.error_type.unwrap_or_else(|| "Error".to_string());
                let message = outcome
                    .error_message
                    .unwrap_or_else(|| "code execution failed".to_string());
                return Err(ToolError::execution(format!("{}: {}", kind, message)));
            }

            let mut variables = outcome.variables.unwrap_or_default();
            let segments = variables.remove("segments");
            let names: Vec<String> = variables.keys().cloned().collect();

            let result = match (segments, timeline) {
                (Some(Value::Array(items)), Some(store)) => {
                    let mut batch = Batch::default();
                    for (index, raw) in items.into_iter().enumerate() {
                        let outcome = serde_json::from_value::<SegmentArgs>(raw)
                            .map_err(ToolError::from)
                            .and_then(|segment| apply_segment(store.as_ref(), &segment));
                        batch.push(index, outcome);
                    }
                    debug!(created = batch.created(), "Applied segments from sequence code");
                    batch.into_result()
                }
                (Some(other), Some(_)) if !other.is_null() => {
                    return Err(ToolError::execution(format!(
                        "`segments` must be a list, got {}",
                        other
                    )));
                }
                _ => ToolResult::success().with("created", 0),
            };

            Ok(result.with("variables", json!(names)))
        }
    }
}
