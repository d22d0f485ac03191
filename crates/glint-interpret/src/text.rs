use glint_protocol::NormalizedResponse;

/// Assistant text of the first choice.
///
/// Looks at message content, then the legacy `text` field, then streaming
/// delta content. Missing content is an empty string.
pub fn extract_text(response: &NormalizedResponse) -> String {
    let Some(choice) = response.first_choice() else {
        return String::new();
    };

    choice
        .message
        .as_ref()
        .and_then(|m| m.content.clone())
        .or_else(|| choice.text.clone())
        .or_else(|| choice.delta.as_ref().and_then(|d| d.content.clone()))
        .unwrap_or_default()
}
