//! One-line summaries of tool results for the final reply

use glint_protocol::ToolResult;
use serde_json::Value;

fn count(result: &ToolResult, key: &str) -> u64 {
    result.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn plural(n: u64, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

fn text<'a>(result: &'a ToolResult, key: &str) -> &'a str {
    result.get(key).and_then(Value::as_str).unwrap_or("?")
}

/// Human-readable summary keyed by tool name
pub fn summarize(name: &str, result: &ToolResult) -> String {
    if let Some(error) = result.error_message() {
        let created = count(result, "created");
        return if created > 0 {
            format!(
                "{} partially failed ({} created): {}",
                name,
                plural(created, "segment"),
                error
            )
        } else {
            format!("{} failed: {}", name, error)
        };
    }

    match name {
        "create_segment" => format!(
            "Created 1 segment on ball {}",
            result.get("ball").map(|b| b.to_string()).unwrap_or_default()
        ),
        "create_segments" => format!("Created {}", plural(count(result, "created"), "segment")),
        "clear_timeline" => format!("Cleared {}", plural(count(result, "cleared"), "segment")),
        "list_timelines" => format!("Listed {}", plural(count(result, "count"), "timeline")),
        "create_segment_for_word" => format!(
            "Created {} for \"{}\" ({})",
            plural(count(result, "created"), "segment"),
            text(result, "word"),
            plural(count(result, "occurrences"), "occurrence")
        ),
        "get_beats" => format!("Found {}", plural(count(result, "count"), text(result, "type"))),
        "get_section" => format!(
            "Section {} runs {}s to {}s",
            text(result, "label"),
            result.get("start_time").map(|v| v.to_string()).unwrap_or_default(),
            result.get("end_time").map(|v| v.to_string()).unwrap_or_default()
        ),
        "get_feature_value" => format!(
            "{} at {}s is {}",
            text(result, "feature"),
            result.get("time").map(|v| v.to_string()).unwrap_or_default(),
            result.get("value").map(|v| v.to_string()).unwrap_or_default()
        ),
        "execute_sequence_code" => format!(
            "Sequence code ran and created {}",
            plural(count(result, "created"), "segment")
        ),
        _ => format!("{} completed", name),
    }
}
