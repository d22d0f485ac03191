//! Interfaces to the host application
//!
//! The engine never owns the timeline, the audio analysis or the code
//! sandbox. The host hands implementations of these traits to
//! [`Collaborators`] at construction time, and whichever are present decide
//! the capability set used to gate tool advertisement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{Capability, CapabilitySet};

/// One colored span on a ball's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub ball: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub color: [u8; 3],
}

/// Handle to a segment that was just created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub ball: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub ball: usize,
    pub segments: Vec<Segment>,
}

pub trait TimelineStore: Send + Sync {
    /// `None` when the ball index does not exist or the span is rejected
    fn create_segment(
        &self,
        ball: usize,
        start_time: f64,
        end_time: f64,
        color: [u8; 3],
    ) -> Option<SegmentRef>;

    /// Remove every segment from a ball; `None` when the ball does not exist
    fn clear_timeline(&self, ball: usize) -> Option<usize>;

    fn timelines(&self) -> Vec<Timeline>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatKind {
    #[default]
    Beat,
    Downbeat,
}

impl FromStr for BeatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beat" | "beats" | "" => Ok(BeatKind::Beat),
            "downbeat" | "downbeats" | "bar" | "bars" => Ok(BeatKind::Downbeat),
            other => Err(format!("unknown beat type: {}", other)),
        }
    }
}

impl fmt::Display for BeatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeatKind::Beat => f.write_str("beat"),
            BeatKind::Downbeat => f.write_str("downbeat"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub label: String,
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    pub time: f64,
    pub value: f64,
}

/// Everything the audio pipeline knows about the loaded song
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisData {
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub beats: Vec<f64>,
    #[serde(default)]
    pub downbeats: Vec<f64>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub words: Vec<WordTiming>,
    #[serde(default)]
    pub features: HashMap<String, Vec<FeaturePoint>>,
}

pub trait AnalysisStore: Send + Sync {
    fn load_analysis(&self) -> Option<AnalysisData>;

    fn beats_in_range(&self, start: f64, end: f64, kind: BeatKind) -> Vec<f64>;

    fn section_by_label(&self, label: &str) -> Option<Section>;

    fn feature_value_at(&self, time: f64, feature: &str) -> Option<Value>;
}

/// What the sandbox reports after running a piece of sequence code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ExecutionOutcome {
    pub fn ok(variables: Map<String, Value>) -> Self {
        Self {
            success: true,
            variables: Some(variables),
            ..Default::default()
        }
    }

    pub fn failed(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            variables: None,
            error_type: Some(error_type.into()),
            error_message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, code: &str, context: Map<String, Value>) -> ExecutionOutcome;
}

pub trait PreferenceStore: Send + Sync {
    /// Free-text summary of the user's feedback for a song, if any
    fn preference_summary(&self, song_id: &str) -> Option<String>;
}

/// The host collaborators available to tools and the coordinator
#[derive(Clone, Default)]
pub struct Collaborators {
    pub timeline: Option<Arc<dyn TimelineStore>>,
    pub analysis: Option<Arc<dyn AnalysisStore>>,
    pub executor: Option<Arc<dyn CodeExecutor>>,
    pub preferences: Option<Arc<dyn PreferenceStore>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(mut self, timeline: Arc<dyn TimelineStore>) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn with_analysis(mut self, analysis: Arc<dyn AnalysisStore>) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn CodeExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn capabilities(&self) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        if self.timeline.is_some() {
            set.insert(Capability::Timeline);
        }
        if self.analysis.is_some() {
            set.insert(Capability::AudioAnalysis);
        }
        if self.executor.is_some() {
            set.insert(Capability::CodeExecution);
        }
        if self.preferences.is_some() {
            set.insert(Capability::Preferences);
        }
        set
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTimeline;

    #[test]
    fn test_capabilities_follow_collaborators() {
        assert!(Collaborators::new().capabilities().is_empty());

        let collaborators = Collaborators::new().with_timeline(Arc::new(InMemoryTimeline::new(4)));
        let caps = collaborators.capabilities();
        assert!(caps.contains(Capability::Timeline));
        assert!(!caps.contains(Capability::AudioAnalysis));
    }

    #[test]
    fn test_beat_kind_parse() {
        assert_eq!("Downbeats".parse::<BeatKind>(), Ok(BeatKind::Downbeat));
        assert_eq!("".parse::<BeatKind>(), Ok(BeatKind::Beat));
        assert!("snare".parse::<BeatKind>().is_err());
    }
}
