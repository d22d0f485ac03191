//! Argument lists written as call syntax in free text

use glint_protocol::Arguments;
use serde_json::Value;

/// Split on commas that are not nested in brackets or quotes
pub fn split_top_level(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in input.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                push_part(&mut parts, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_part(&mut parts, &current);

    parts
}

fn push_part(parts: &mut Vec<String>, part: &str) {
    let trimmed = part.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
}

/// `key=value` split, only when the left side is a bare identifier
fn split_keyword(arg: &str) -> Option<(&str, &str)> {
    let bytes = arg.as_bytes();
    for (i, c) in arg.char_indices() {
        match c {
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    return None;
                }
                let key = arg[..i].trim();
                return is_identifier(key).then(|| (key, arg[i + 1..].trim()));
            }
            c if c.is_alphanumeric() || c == '_' || c.is_whitespace() => {}
            _ => return None,
        }
    }
    None
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Turn a literal as written by the model into a JSON value.
///
/// Python and JSON spellings of booleans and null are both accepted. Quoted
/// strings are unescaped. Anything unrecognised stays a string.
pub fn coerce_literal(raw: &str) -> Value {
    let s = raw.trim();
    match s {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "null" | "None" => return Value::Null,
        _ => {}
    }

    if let Some(inner) = unquote(s) {
        return Value::String(inner);
    }

    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }

    if s.starts_with('[') || s.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(s) {
            return value;
        }
        let pythonic = s
            .replace('\'', "\"")
            .replace("True", "true")
            .replace("False", "false")
            .replace("None", "null");
        if let Ok(value) = serde_json::from_str::<Value>(&pythonic) {
            return value;
        }
    }

    Value::String(s.to_string())
}

fn unquote(s: &str) -> Option<String> {
    for triple in ["\"\"\"", "'''"] {
        if s.len() >= 6 && s.starts_with(triple) && s.ends_with(triple) {
            return Some(s[3..s.len() - 3].to_string());
        }
    }

    let first = s.chars().next()?;
    if s.len() >= 2 && (first == '"' || first == '\'') && s.ends_with(first) {
        return Some(unescape(&s[1..s.len() - 1]));
    }
    None
}

pub(crate) fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(q @ ('"' | '\'' | '\\')) => out.push(q),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse the text between a call's parentheses.
///
/// Keyword arguments keep their names; positional ones become `arg0`, `arg1`
/// and so on, counted among positionals only.
pub fn parse_call_arguments(input: &str) -> Arguments {
    let mut arguments = Arguments::new();
    let mut positional = 0;

    for part in split_top_level(input) {
        match split_keyword(&part) {
            Some((key, value)) => {
                arguments.insert(key.to_string(), coerce_literal(value));
            }
            None => {
                arguments.insert(format!("arg{}", positional), coerce_literal(&part));
                positional += 1;
            }
        }
    }

    arguments
}
