//! System and corrective prompts

use glint_tools::PreferenceStore;

/// Built-in system prompt for choreography requests
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a lighting choreographer for a juggling ball light show.

Each ball has its own timeline of color segments. A segment has a start time and
an end time in seconds and a single RGB color. Balls are numbered from 0.

Use the provided tools to change the show:
- create_segment / create_segments to place colors on balls
- clear_timeline to remove segments
- get_beats, get_section and get_feature_value to align changes with the music
- create_segment_for_word to light balls while a lyric is sung
- execute_sequence_code for patterns that are easier to compute than to list

When you cannot call tools, describe the sequence instead, one line per step:
  MM:SS-MM:SS: [r, g, b]
or as a JSON list of {"start_time", "end_time", "color"} objects.

To ask the host to do something outside the timeline, emit a block such as:
  [ACTION:play_audio]
  start_time=30
  [/ACTION]

If the request is unclear, ask which option the user meant and list the options."#;

/// Pick the system message for a request and prepend stored preferences.
///
/// Precedence is the request's own message, then the configured one, then
/// [`DEFAULT_SYSTEM_PROMPT`].
pub fn compose_system_message(
    request_message: Option<&str>,
    configured: Option<&str>,
    preferences: Option<&dyn PreferenceStore>,
    song_id: Option<&str>,
) -> String {
    let base = request_message
        .or(configured)
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let summary = match (preferences, song_id) {
        (Some(store), Some(song)) => store
            .preference_summary(song)
            .filter(|s| !s.trim().is_empty()),
        _ => None,
    };

    match summary {
        Some(summary) => format!(
            "User preferences for this song:\n{}\n\n{}",
            summary.trim(),
            base
        ),
        None => base.to_string(),
    }
}

/// What the model needs to know to fix a failed call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryContext {
    pub original_prompt: String,
    pub function_name: String,
    pub error: String,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl RetryContext {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn corrective_prompt(&self, available_tools: &[String]) -> String {
        let tools = if available_tools.is_empty() {
            "(none)".to_string()
        } else {
            available_tools.join(", ")
        };
        format!(
            "The previous call to `{name}` failed with this error:\n{error}\n\n\
             Original request:\n{prompt}\n\n\
             Available tools: {tools}\n\n\
             Fix the arguments and call a tool again, or answer in text if no tool fits. \
             (attempt {attempt} of {max})",
            name = self.function_name,
            error = self.error,
            prompt = self.original_prompt,
            tools = tools,
            attempt = self.retry_count + 1,
            max = self.max_retries,
        )
    }
}
