//! In-memory collaborators for tests and hosts without a real editor

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use crate::{
    AnalysisData, AnalysisStore, BeatKind, PreferenceStore, Section, Segment, SegmentRef, Timeline,
    TimelineStore,
};

/// A fixed number of ball timelines held in memory
#[derive(Debug)]
pub struct InMemoryTimeline {
    balls: RwLock<Vec<Vec<Segment>>>,
}

impl InMemoryTimeline {
    pub fn new(ball_count: usize) -> Self {
        Self {
            balls: RwLock::new(vec![Vec::new(); ball_count]),
        }
    }

    pub fn ball_count(&self) -> usize {
        self.balls.read().len()
    }

    pub fn segment_count(&self) -> usize {
        self.balls.read().iter().map(Vec::len).sum()
    }
}

impl TimelineStore for InMemoryTimeline {
    fn create_segment(
        &self,
        ball: usize,
        start_time: f64,
        end_time: f64,
        color: [u8; 3],
    ) -> Option<SegmentRef> {
        let mut balls = self.balls.write();
        let segments = balls.get_mut(ball)?;
        if end_time <= start_time {
            return None;
        }
        segments.push(Segment {
            ball,
            start_time,
            end_time,
            color,
        });
        Some(SegmentRef {
            ball,
            index: segments.len() - 1,
        })
    }

    fn clear_timeline(&self, ball: usize) -> Option<usize> {
        let mut balls = self.balls.write();
        let segments = balls.get_mut(ball)?;
        let removed = segments.len();
        segments.clear();
        Some(removed)
    }

    fn timelines(&self) -> Vec<Timeline> {
        self.balls
            .read()
            .iter()
            .enumerate()
            .map(|(ball, segments)| Timeline {
                ball,
                segments: segments.clone(),
            })
            .collect()
    }
}

/// Analysis data loaded once and served read-only
#[derive(Debug, Clone, Default)]
pub struct StaticAnalysis {
    data: Option<AnalysisData>,
}

impl StaticAnalysis {
    pub fn new(data: AnalysisData) -> Self {
        Self { data: Some(data) }
    }

    /// A store that has nothing loaded
    pub fn empty() -> Self {
        Self { data: None }
    }
}

impl AnalysisStore for StaticAnalysis {
    fn load_analysis(&self) -> Option<AnalysisData> {
        self.data.clone()
    }

    fn beats_in_range(&self, start: f64, end: f64, kind: BeatKind) -> Vec<f64> {
        let Some(data) = &self.data else {
            return Vec::new();
        };
        let source = match kind {
            BeatKind::Beat => &data.beats,
            BeatKind::Downbeat => &data.downbeats,
        };
        source
            .iter()
            .copied()
            .filter(|t| *t >= start && *t <= end)
            .collect()
    }

    fn section_by_label(&self, label: &str) -> Option<Section> {
        let label = label.trim();
        self.data
            .as_ref()?
            .sections
            .iter()
            .find(|s| s.label.eq_ignore_ascii_case(label))
            .cloned()
    }

    /// Step interpolation: the last point at or before `time`
    fn feature_value_at(&self, time: f64, feature: &str) -> Option<Value> {
        let points = self.data.as_ref()?.features.get(feature)?;
        points
            .iter()
            .filter(|p| p.time <= time)
            .max_by(|a, b| a.time.total_cmp(&b.time))
            .map(|p| Value::from(p.value))
    }
}

/// Preference summaries keyed by song id
#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    summaries: RwLock<HashMap<String, String>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, song_id: impl Into<String>, summary: impl Into<String>) {
        self.summaries.write().insert(song_id.into(), summary.into());
    }
}

impl PreferenceStore for InMemoryPreferences {
    fn preference_summary(&self, song_id: &str) -> Option<String> {
        self.summaries
            .read()
            .get(song_id)
            .filter(|s| !s.trim().is_empty())
            .cloned()
    }
}
