use glint_protocol::{Arguments, ToolResult};
use serde::Deserialize;
use std::sync::Arc;

use super::{parse, require};
use crate::{AnalysisStore, BeatKind, Capability, ToolError, ToolHandler};

#[derive(Debug, Deserialize)]
struct BeatsArgs {
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    end_time: Option<f64>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

pub(super) fn get_beats(analysis: Option<Arc<dyn AnalysisStore>>) -> impl ToolHandler {
    move |arguments: Arguments| {
        let analysis = analysis.clone();
        async move {
            let store = require(analysis, Capability::AudioAnalysis)?;
            let args: BeatsArgs = parse(arguments)?;
            let kind: BeatKind = args
                .kind
                .as_deref()
                .unwrap_or_default()
                .parse()
                .map_err(ToolError::invalid)?;

            let start = args.start_time.unwrap_or(0.0);
            let end = match args.end_time {
                Some(end) => end,
                None => store
                    .load_analysis()
                    .map(|a| a.duration)
                    .filter(|d| *d > 0.0)
                    .unwrap_or(f64::MAX),
            };
            if end < start {
                return Err(ToolError::invalid(format!(
                    "end_time {} is before start_time {}",
                    end, start
                )));
            }

            let beats = store.beats_in_range(start, end, kind);
            Ok(ToolResult::success()
                .with("type", kind.to_string())
                .with("count", beats.len() as u64)
                .with("beats", beats))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SectionArgs {
    label: String,
}

pub(super) fn get_section(analysis: Option<Arc<dyn AnalysisStore>>) -> impl ToolHandler {
    move |arguments: Arguments| {
        let analysis = analysis.clone();
        async move {
            let store = require(analysis, Capability::AudioAnalysis)?;
            let args: SectionArgs = parse(arguments)?;

            match store.section_by_label(&args.label) {
                Some(section) => Ok(ToolResult::success()
                    .with("label", section.label)
                    .with("start_time", section.start_time)
                    .with("end_time", section.end_time)),
                None => {
                    let known: Vec<String> = store
                        .load_analysis()
                        .map(|a| a.sections.into_iter().map(|s| s.label).collect())
                        .unwrap_or_default();
                    let mut message = format!("no section labelled \"{}\"", args.label);
                    if !known.is_empty() {
                        message.push_str(&format!(" (known sections: {})", known.join(", ")));
                    }
                    Err(ToolError::execution(message))
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureArgs {
    time: f64,
    feature: String,
}

pub(super) fn get_feature_value(analysis: Option<Arc<dyn AnalysisStore>>) -> impl ToolHandler {
    move |arguments: Arguments| {
        let analysis = analysis.clone();
        async move {
            let store = require(analysis, Capability::AudioAnalysis)?;
            let args: FeatureArgs = parse(arguments)?;

            let value = store
                .feature_value_at(args.time, &args.feature)
                .ok_or_else(|| {
                    ToolError::execution(format!(
                        "no {} value at {}s",
                        args.feature, args.time
                    ))
                })?;
            Ok(ToolResult::success()
                .with("feature", args.feature)
                .with("time", args.time)
                .with("value", value))
        }
    }
}
