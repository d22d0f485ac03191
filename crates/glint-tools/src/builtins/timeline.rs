use glint_protocol::{Arguments, ToolResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse, require, resolve_color};
use crate::{
    AnalysisStore, Capability, SegmentRef, TimelineStore, ToolError, ToolHandler, WordTiming,
};

#[derive(Debug, Deserialize)]
pub(super) struct SegmentArgs {
    ball: usize,
    start_time: f64,
    end_time: f64,
    color: Value,
}

fn check_span(start_time: f64, end_time: f64) -> Result<(), ToolError> {
    if !start_time.is_finite() || !end_time.is_finite() {
        return Err(ToolError::invalid("segment times must be finite"));
    }
    if start_time < 0.0 {
        return Err(ToolError::invalid(format!(
            "start_time {} is negative",
            start_time
        )));
    }
    if end_time <= start_time {
        return Err(ToolError::invalid(format!(
            "end_time {} must be after start_time {}",
            end_time, start_time
        )));
    }
    Ok(())
}

fn place(
    store: &dyn TimelineStore,
    ball: usize,
    start_time: f64,
    end_time: f64,
    color: [u8; 3],
) -> Result<SegmentRef, ToolError> {
    check_span(start_time, end_time)?;
    store
        .create_segment(ball, start_time, end_time, color)
        .ok_or_else(|| ToolError::execution(format!("bad ball index {}", ball)))
}

pub(super) fn apply_segment(
    store: &dyn TimelineStore,
    args: &SegmentArgs,
) -> Result<SegmentRef, ToolError> {
    let color = resolve_color(&args.color)?;
    place(store, args.ball, args.start_time, args.end_time, color)
}

/// Outcome of applying many segments; failures do not stop the batch
#[derive(Debug, Default)]
pub(super) struct Batch {
    created: Vec<SegmentRef>,
    failed: Vec<Value>,
}

impl Batch {
    pub(super) fn push(&mut self, index: usize, outcome: Result<SegmentRef, ToolError>) {
        match outcome {
            Ok(segment) => self.created.push(segment),
            Err(e) => self.failed.push(json!({"index": index, "error": e.to_string()})),
        }
    }

    pub(super) fn created(&self) -> usize {
        self.created.len()
    }

    /// Failures surface as `error` next to whatever was created
    pub(super) fn into_result(self) -> ToolResult {
        let total = self.created.len() + self.failed.len();
        let first_error = self
            .failed
            .first()
            .and_then(|f| f.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut result = ToolResult::success()
            .with("created", self.created.len() as u64)
            .with("segments", json!(self.created));
        if let Some(first) = first_error {
            result = ToolResult::error(format!(
                "{} of {} segments failed: {}",
                self.failed.len(),
                total,
                first
            ))
            .with("created", self.created.len() as u64)
            .with("segments", json!(self.created))
            .with("failed", Value::Array(self.failed));
        }
        result
    }
}

pub(super) fn create_segment(timeline: Option<Arc<dyn TimelineStore>>) -> impl ToolHandler {
    move |arguments: Arguments| {
        let timeline = timeline.clone();
        async move {
            let store = require(timeline, Capability::Timeline)?;
            let args: SegmentArgs = parse(arguments)?;
            let segment = apply_segment(store.as_ref(), &args)?;
            Ok(ToolResult::success()
                .with("ball", segment.ball as u64)
                .with("index", segment.index as u64)
                .with("start_time", args.start_time)
                .with("end_time", args.end_time))
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateSegmentsArgs {
    segments: Vec<Value>,
}

pub(super) fn create_segments(timeline: Option<Arc<dyn TimelineStore>>) -> impl ToolHandler {
    move |arguments: Arguments| {
        let timeline = timeline.clone();
        async move {
            let store = require(timeline, Capability::Timeline)?;
            let args: CreateSegmentsArgs = parse(arguments)?;
            if args.segments.is_empty() {
                return Err(ToolError::invalid("segments is empty"));
            }

            let mut batch = Batch::default();
            for (index, raw) in args.segments.into_iter().enumerate() {
                let outcome = serde_json::from_value::<SegmentArgs>(raw)
                    .map_err(ToolError::from)
                    .and_then(|segment| apply_segment(store.as_ref(), &segment));
                batch.push(index, outcome);
            }
            Ok(batch.into_result())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClearArgs {
    #[serde(default)]
    ball: Option<usize>,
}

pub(super) fn clear_timeline(timeline: Option<Arc<dyn TimelineStore>>) -> impl ToolHandler {
    move |arguments: Arguments| {
        let timeline = timeline.clone();
        async move {
            let store = require(timeline, Capability::Timeline)?;
            let args: ClearArgs = parse(arguments)?;

            let balls: Vec<usize> = match args.ball {
                Some(ball) => vec![ball],
                None => store.timelines().iter().map(|t| t.ball).collect(),
            };

            let mut cleared = 0;
            for ball in &balls {
                cleared += store
                    .clear_timeline(*ball)
                    .ok_or_else(|| ToolError::execution(format!("bad ball index {}", ball)))?;
            }
            Ok(ToolResult::success()
                .with("cleared", cleared as u64)
                .with("balls", json!(balls)))
        }
    }
}

pub(super) fn list_timelines(timeline: Option<Arc<dyn TimelineStore>>) -> impl ToolHandler {
    move |_arguments: Arguments| {
        let timeline = timeline.clone();
        async move {
            let store = require(timeline, Capability::Timeline)?;
            let timelines = store.timelines();
            Ok(ToolResult::success()
                .with("count", timelines.len() as u64)
                .with("timelines", serde_json::to_value(timelines)?))
        }
    }
}

#[derive(Debug, Deserialize)]
struct WordArgs {
    word: String,
    color: Value,
    #[serde(default)]
    balls: Value,
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .to_lowercase()
}

fn word_occurrences<'a>(words: &'a [WordTiming], target: &str) -> Vec<&'a WordTiming> {
    let target = normalize_word(target);
    words
        .iter()
        .filter(|w| normalize_word(&w.word) == target)
        .collect()
}

/// `balls` may be absent or "all", a single index, or a list of indices
fn select_balls(value: &Value, store: &dyn TimelineStore) -> Result<Vec<usize>, ToolError> {
    let all = || -> Vec<usize> { store.timelines().iter().map(|t| t.ball).collect() };
    match value {
        Value::Null => Ok(all()),
        Value::String(s) if s.trim().eq_ignore_ascii_case("all") => Ok(all()),
        Value::Number(n) => n
            .as_u64()
            .and_then(|b| usize::try_from(b).ok())
            .map(|b| vec![b])
            .ok_or_else(|| ToolError::invalid(format!("bad ball index {}", n))),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| usize::try_from(b).ok())
                    .ok_or_else(|| ToolError::invalid(format!("bad ball index {}", item)))
            })
            .collect(),
        other => Err(ToolError::invalid(format!("unsupported balls value: {}", other))),
    }
}

pub(super) fn create_segment_for_word(
    timeline: Option<Arc<dyn TimelineStore>>,
    analysis: Option<Arc<dyn AnalysisStore>>,
) -> impl ToolHandler {
    move |arguments: Arguments| {
        let timeline = timeline.clone();
        let analysis = analysis.clone();
        async move {
            let store = require(timeline, Capability::Timeline)?;
            let analysis = require(analysis, Capability::AudioAnalysis)?;
            let args: WordArgs = parse(arguments)?;
            let color = resolve_color(&args.color)?;
            let balls = select_balls(&args.balls, store.as_ref())?;

            let data = analysis
                .load_analysis()
                .ok_or_else(|| ToolError::execution("no audio analysis is loaded"))?;
            let occurrences = word_occurrences(&data.words, &args.word);
            if occurrences.is_empty() {
                return Err(ToolError::execution(format!(
                    "word \"{}\" does not appear in the lyrics",
                    args.word
                )));
            }

            let mut batch = Batch::default();
            let mut index = 0;
            for occurrence in &occurrences {
                for ball in &balls {
                    batch.push(
                        index,
                        place(
                            store.as_ref(),
                            *ball,
                            occurrence.start_time,
                            occurrence.end_time,
                            color,
                        ),
                    );
                    index += 1;
                }
            }

            Ok(batch
                .into_result()
                .with("word", args.word)
                .with("occurrences", occurrences.len() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryTimeline, StaticAnalysis};
    use crate::AnalysisData;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_create_segment_rejects_bad_ball() {
        let store: Arc<dyn TimelineStore> = Arc::new(InMemoryTimeline::new(2));
        let handler = create_segment(Some(store.clone()));

        let ok = handler
            .call(args(json!({"ball": 1, "start_time": 0.5, "end_time": 1.5, "color": "blue"})))
            .await
            .unwrap();
        assert!(ok.is_success());
        assert_eq!(store.timelines()[1].segments[0].color, [0, 0, 255]);

        let err = handler
            .call(args(json!({"ball": 5, "start_time": 0, "end_time": 1, "color": [1, 2, 3]})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "bad ball index 5");
    }

    #[test]
    fn test_select_balls_rejects_non_indices() {
        let store = InMemoryTimeline::new(3);
        assert_eq!(select_balls(&Value::Null, &store).unwrap(), vec![0, 1, 2]);
        assert_eq!(select_balls(&json!("All"), &store).unwrap(), vec![0, 1, 2]);
        assert_eq!(select_balls(&json!(2), &store).unwrap(), vec![2]);
        assert_eq!(select_balls(&json!([0, 2]), &store).unwrap(), vec![0, 2]);

        let err = select_balls(&json!(-1), &store).unwrap_err();
        assert_eq!(err.to_string(), "bad ball index -1");
        let err = select_balls(&json!([0, 1.5]), &store).unwrap_err();
        assert_eq!(err.to_string(), "bad ball index 1.5");
        assert!(select_balls(&json!({"ball": 1}), &store).is_err());
    }

    #[tokio::test]
    async fn test_create_segment_rejects_backwards_span() {
        let handler = create_segment(Some(Arc::new(InMemoryTimeline::new(1))));
        let err = handler
            .call(args(json!({"ball": 0, "start_time": 2, "end_time": 1, "color": "red"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_batch_reports_partial_failure() {
        let store: Arc<dyn TimelineStore> = Arc::new(InMemoryTimeline::new(2));
        let handler = create_segments(Some(store.clone()));

        let result = handler
            .call(args(json!({"segments": [
                {"ball": 0, "start_time": 0, "end_time": 1, "color": "red"},
                {"ball": 9, "start_time": 0, "end_time": 1, "color": "red"},
                {"ball": 1, "start_time": 1, "end_time": 2, "color": [0, 255, 0]}
            ]})))
            .await
            .unwrap();

        assert!(result.is_failure());
        assert_eq!(result.get("created"), Some(&json!(2)));
        assert_eq!(
            result.error_message().as_deref(),
            Some("1 of 3 segments failed: bad ball index 9")
        );
        assert_eq!(store.timelines()[1].segments.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_timelines() {
        let memory = Arc::new(InMemoryTimeline::new(3));
        memory.create_segment(0, 0.0, 1.0, [1, 1, 1]);
        memory.create_segment(2, 0.0, 1.0, [1, 1, 1]);
        memory.create_segment(2, 1.0, 2.0, [1, 1, 1]);

        let handler = clear_timeline(Some(memory.clone()));
        let result = handler.call(Arguments::new()).await.unwrap();
        assert_eq!(result.get("cleared"), Some(&json!(3)));
        assert!(memory.timelines().iter().all(|t| t.segments.is_empty()));
    }

    #[tokio::test]
    async fn test_word_segments_follow_lyrics() {
        let memory = Arc::new(InMemoryTimeline::new(3));
        let analysis = StaticAnalysis::new(AnalysisData {
            duration: 30.0,
            words: vec![
                WordTiming {
                    word: "Hi,".into(),
                    start_time: 1.0,
                    end_time: 1.4,
                },
                WordTiming {
                    word: "there".into(),
                    start_time: 1.4,
                    end_time: 2.0,
                },
                WordTiming {
                    word: "hi".into(),
                    start_time: 8.0,
                    end_time: 8.5,
                },
            ],
            ..Default::default()
        });
        let handler = create_segment_for_word(Some(memory.clone()), Some(Arc::new(analysis)));

        let result = handler
            .call(args(json!({"word": "hi", "color": "red", "balls": [0, 2]})))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.get("occurrences"), Some(&json!(2)));
        assert_eq!(result.get("created"), Some(&json!(4)));
        assert_eq!(memory.timelines()[1].segments.len(), 0);
        assert_eq!(memory.timelines()[2].segments[1].start_time, 8.0);

        let missing = handler
            .call(args(json!({"word": "goodbye", "color": "red"})))
            .await
            .unwrap_err();
        assert!(missing.to_string().contains("does not appear"));
    }

    #[tokio::test]
    async fn test_missing_collaborator_is_unavailable() {
        let err = list_timelines(None).call(Arguments::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::Unavailable {
                capability: Capability::Timeline
            }
        ));
    }
}
