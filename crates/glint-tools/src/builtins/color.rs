use serde_json::Value;

use crate::ToolError;

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("red", [255, 0, 0]),
    ("green", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("white", [255, 255, 255]),
    ("black", [0, 0, 0]),
    ("off", [0, 0, 0]),
    ("yellow", [255, 255, 0]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("violet", [238, 130, 238]),
    ("pink", [255, 192, 203]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("teal", [0, 128, 128]),
    ("gold", [255, 215, 0]),
];

/// Accepts `[r, g, b]`, `"#rrggbb"`, `"r,g,b"` (optionally bracketed) or a color name
pub fn resolve_color(value: &Value) -> Result<[u8; 3], ToolError> {
    match value {
        Value::Array(items) => {
            let components: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
            if items.len() != 3 || components.len() != 3 {
                return Err(ToolError::invalid(format!(
                    "color must have three numeric components, got {}",
                    value
                )));
            }
            triple(&components)
        }
        Value::String(text) => parse_color_text(text),
        other => Err(ToolError::invalid(format!("unsupported color: {}", other))),
    }
}

fn parse_color_text(text: &str) -> Result<[u8; 3], ToolError> {
    let text = text.trim();

    if let Some(hex) = text.strip_prefix('#') {
        if hex.len() == 6 {
            if let Ok(packed) = u32::from_str_radix(hex, 16) {
                return Ok([(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]);
            }
        }
        return Err(ToolError::invalid(format!("bad hex color: {}", text)));
    }

    let inner = text.trim_start_matches(['[', '(']).trim_end_matches([']', ')']);
    if inner.contains(',') {
        let components: Result<Vec<f64>, _> =
            inner.split(',').map(|part| part.trim().parse::<f64>()).collect();
        return match components {
            Ok(components) if components.len() == 3 => triple(&components),
            _ => Err(ToolError::invalid(format!("bad color triple: {}", text))),
        };
    }

    let lowered = text.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, rgb)| *rgb)
        .ok_or_else(|| ToolError::invalid(format!("unknown color: {}", text)))
}

fn triple(components: &[f64]) -> Result<[u8; 3], ToolError> {
    let mut rgb = [0u8; 3];
    for (slot, component) in rgb.iter_mut().zip(components) {
        if !(0.0..=255.0).contains(component) {
            return Err(ToolError::invalid(format!(
                "color component {} is outside 0-255",
                component
            )));
        }
        *slot = component.round() as u8;
    }
    Ok(rgb)
}
