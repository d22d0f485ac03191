//! Function-call recovery for backends without native tool calling.
//!
//! A [`CallCascade`] is an ordered list of [`CallPattern`]s; the first one to
//! produce a call wins. The standard order is:
//!
//! 1. `execute_sequence_code("""...""")` with a triple-quoted argument
//! 2. the same call with a `'...'` or `"..."` argument
//! 3. a generic `name(args)` call in prose, outside code fences
//! 4. a fenced `python` block (or the first unlabeled one)

use glint_protocol::{ArgumentParseError, Arguments, FunctionCall, NormalizedResponse};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::args::{parse_call_arguments, unescape};
use crate::text::extract_text;

/// Tool whose single argument is a block of sequence code
pub const CODE_EXECUTION_CALL: &str = "execute_sequence_code";

/// Legacy signature whose positional arguments get names
const WORD_SEGMENT_CALL: &str = "create_segment_for_word";
const WORD_SEGMENT_PARAMS: [&str; 3] = ["word", "color", "balls"];

/// Python builtins that show up in prose and code but are never tools
const IGNORED_CALLS: &[&str] = &[
    "print", "range", "len", "str", "int", "float", "list", "dict", "set", "tuple", "round",
    "min", "max", "sum", "abs", "enumerate", "zip", "sorted",
];

lazy_static! {
    static ref TRIPLE_DOUBLE: Regex = Regex::new(
        r#"execute_sequence_code\s*\(\s*(?:code\s*=\s*)?[rR]?"""([\s\S]*?)"""\s*\)"#
    )
    .unwrap();
    static ref TRIPLE_SINGLE: Regex = Regex::new(
        r#"execute_sequence_code\s*\(\s*(?:code\s*=\s*)?[rR]?'''([\s\S]*?)'''\s*\)"#
    )
    .unwrap();
    static ref SINGLE_DOUBLE: Regex = Regex::new(
        r#"(?s)execute_sequence_code\s*\(\s*(?:code\s*=\s*)?"((?:[^"\\]|\\.)*)"\s*\)"#
    )
    .unwrap();
    static ref SINGLE_SINGLE: Regex = Regex::new(
        r#"(?s)execute_sequence_code\s*\(\s*(?:code\s*=\s*)?'((?:[^'\\]|\\.)*)'\s*\)"#
    )
    .unwrap();
    static ref CALL_START: Regex = Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\(").unwrap();
    static ref FENCE: Regex = Regex::new(r"```([A-Za-z0-9_+-]*)[^\n]*\n([\s\S]*?)```").unwrap();
    static ref STANDARD_CASCADE: CallCascade = CallCascade::standard();
}

/// One strategy for spotting a function call in free text
pub trait CallPattern: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, text: &str) -> Option<FunctionCall>;
}

/// Ordered set of call patterns
pub struct CallCascade {
    patterns: Vec<Box<dyn CallPattern>>,
}

impl CallCascade {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn standard() -> Self {
        Self::new()
            .with(TripleQuotedCodeCall)
            .with(SingleQuotedCodeCall)
            .with(GenericCall)
            .with(FencedBlockCall)
    }

    pub fn with(mut self, pattern: impl CallPattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn pattern_names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|p| p.name()).collect()
    }

    pub fn extract(&self, text: &str) -> Option<FunctionCall> {
        for pattern in &self.patterns {
            if let Some(call) = pattern.extract(text) {
                debug!(
                    pattern = pattern.name(),
                    function = %call.name,
                    "Recovered function call from text"
                );
                return Some(call);
            }
        }
        None
    }
}

impl Default for CallCascade {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CallCascade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallCascade")
            .field("patterns", &self.pattern_names())
            .finish()
    }
}

/// Run the standard cascade over free text
pub fn extract_function_call(text: &str) -> Option<FunctionCall> {
    STANDARD_CASCADE.extract(text)
}

/// Function call carried by a response.
///
/// The native call is preferred. Without one, and when the backend lacks
/// native tool support, the reply text goes through the cascade.
pub fn function_call(
    response: &NormalizedResponse,
    allow_text_fallback: bool,
) -> Result<Option<FunctionCall>, ArgumentParseError> {
    if let Some(raw) = response.function_call() {
        return raw.parse().map(Some);
    }
    if !allow_text_fallback {
        return Ok(None);
    }
    Ok(extract_function_call(&extract_text(response)))
}

fn code_call(code: String) -> FunctionCall {
    let mut arguments = Arguments::new();
    arguments.insert("code".to_string(), Value::String(code));
    FunctionCall::new(CODE_EXECUTION_CALL, arguments)
}

pub struct TripleQuotedCodeCall;

impl CallPattern for TripleQuotedCodeCall {
    fn name(&self) -> &'static str {
        "triple_quoted_code"
    }

    fn extract(&self, text: &str) -> Option<FunctionCall> {
        [&*TRIPLE_DOUBLE, &*TRIPLE_SINGLE]
            .iter()
            .find_map(|re| re.captures(text))
            .map(|caps| code_call(caps[1].to_string()))
    }
}

pub struct SingleQuotedCodeCall;

impl CallPattern for SingleQuotedCodeCall {
    fn name(&self) -> &'static str {
        "single_quoted_code"
    }

    fn extract(&self, text: &str) -> Option<FunctionCall> {
        [&*SINGLE_DOUBLE, &*SINGLE_SINGLE]
            .iter()
            .find_map(|re| re.captures(text))
            .map(|caps| code_call(unescape(&caps[1])))
    }
}

/// `name(args)` written directly in prose
pub struct GenericCall;

impl CallPattern for GenericCall {
    fn name(&self) -> &'static str {
        "generic_call"
    }

    fn extract(&self, text: &str) -> Option<FunctionCall> {
        let prose = FENCE.replace_all(text, "\n");
        let (name, args) = find_call(&prose)?;
        Some(FunctionCall::new(name, parse_call_arguments(&args)))
    }
}

/// A call inside a fenced code block
pub struct FencedBlockCall;

impl CallPattern for FencedBlockCall {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn extract(&self, text: &str) -> Option<FunctionCall> {
        let block = fenced_block(text)?;
        let content = block.trim();

        if content.starts_with(CODE_EXECUTION_CALL) {
            return TripleQuotedCodeCall
                .extract(content)
                .or_else(|| SingleQuotedCodeCall.extract(content));
        }

        let (name, args) = find_call(content)?;
        let mut arguments = parse_call_arguments(&args);
        if name == WORD_SEGMENT_CALL {
            arguments = name_positionals(arguments, &WORD_SEGMENT_PARAMS);
        }
        Some(FunctionCall::new(name, arguments))
    }
}

fn fenced_block(text: &str) -> Option<String> {
    let blocks: Vec<(String, String)> = FENCE
        .captures_iter(text)
        .map(|caps| (caps[1].to_ascii_lowercase(), caps[2].to_string()))
        .collect();

    blocks
        .iter()
        .find(|(label, _)| label == "python" || label == "py")
        .or_else(|| blocks.iter().find(|(label, _)| label.is_empty()))
        .map(|(_, body)| body.clone())
}

/// Rename `arg0..` to the given parameter names, keeping argument order
fn name_positionals(arguments: Arguments, params: &[&str]) -> Arguments {
    let mut named = Arguments::new();
    for (key, value) in arguments {
        let target = key
            .strip_prefix("arg")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| params.get(n))
            .map(|p| p.to_string())
            .unwrap_or(key);
        named.entry(target).or_insert(value);
    }
    named
}

/// First plausible tool call in `text`: a snake_case name directly followed
/// by a balanced argument list
fn find_call(text: &str) -> Option<(String, String)> {
    for caps in CALL_START.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        if !name.contains('_') || IGNORED_CALLS.contains(&name) {
            continue;
        }
        if whole.start() > 0 && text.as_bytes()[whole.start() - 1] == b'.' {
            continue;
        }

        let open = whole.end();
        if let Some(close) = matching_paren(text, open) {
            return Some((name.to_string(), text[open..close].to_string()));
        }
    }
    None
}

/// Byte index of the `)` closing a list that starts at `open`
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[open..].char_indices() {
        if let Some(q) = quote {
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
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return (c == ')').then_some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_protocol::{RawFunctionCall, Usage};
    use serde_json::json;

    #[test]
    fn test_generic_call_in_prose() {
        let call =
            extract_function_call(r#"create_segment_for_word(word="hi", color="red")"#).unwrap();
        assert_eq!(call.name, "create_segment_for_word");
        assert_eq!(call.arguments["word"], json!("hi"));
        assert_eq!(call.arguments["color"], json!("red"));
        assert_eq!(call.arguments.len(), 2);
    }

    #[test]
    fn test_triple_quoted_code_keeps_newlines_and_quotes() {
        let text = "Here you go:\nexecute_sequence_code(\"\"\"\nfor i in range(4):\n    color = \"red\"\n\"\"\")";
        let call = extract_function_call(text).unwrap();
        assert_eq!(call.name, CODE_EXECUTION_CALL);
        let code = call.arguments["code"].as_str().unwrap();
        assert!(code.contains("for i in range(4):\n"));
        assert!(code.contains("color = \"red\""));
    }

    #[test]
    fn test_single_quoted_code() {
        let call =
            extract_function_call(r#"execute_sequence_code('segments = [(0, 1.0, \'blue\')]')"#)
                .unwrap();
        assert_eq!(
            call.arguments["code"],
            json!("segments = [(0, 1.0, 'blue')]")
        );
    }

    #[test]
    fn test_fenced_block_maps_legacy_positionals() {
        let text = "I'll do that.\n```python\ncreate_segment_for_word(\"drop\", [255, 0, 0], [0, 1])\n```";
        let call = extract_function_call(text).unwrap();
        assert_eq!(call.name, "create_segment_for_word");
        let keys: Vec<_> = call.arguments.keys().cloned().collect();
        assert_eq!(keys, vec!["word", "color", "balls"]);
        assert_eq!(call.arguments["balls"], json!([0, 1]));
    }

    #[test]
    fn test_fenced_code_execution_block() {
        let text = "```python\nexecute_sequence_code(\"\"\"segments = []\"\"\")\n```";
        let call = extract_function_call(text).unwrap();
        assert_eq!(call.arguments["code"], json!("segments = []"));
    }

    #[test]
    fn test_python_fence_preferred_over_unlabeled() {
        let text = "```\nclear_timeline(1)\n```\n```python\nclear_timeline(2)\n```";
        let call = FencedBlockCall.extract(text).unwrap();
        assert_eq!(call.arguments["arg0"], json!(2));
    }

    #[test]
    fn test_generic_ignores_fences_and_builtins() {
        assert!(GenericCall
            .extract("```python\nclear_timeline(0)\n```")
            .is_none());
        assert!(extract_function_call("Use print(x) or len(y) to check.").is_none());
        assert!(extract_function_call("Some timeline(s) were updated").is_none());
        assert!(extract_function_call("call np.clear_all(x)").is_none());
    }

    #[test]
    fn test_no_call_found() {
        assert!(extract_function_call("All four balls are now red.").is_none());
        assert!(extract_function_call("clear_timeline(unclosed").is_none());
    }

    #[test]
    fn test_cascade_is_deterministic() {
        let text = "Try clear_timeline(ball=2) then get_beats(0, 10)";
        let first = extract_function_call(text);
        for _ in 0..5 {
            assert_eq!(extract_function_call(text), first);
        }
        assert_eq!(first.unwrap().name, "clear_timeline");
    }

    #[test]
    fn test_cascade_order() {
        assert_eq!(
            CallCascade::standard().pattern_names(),
            vec![
                "triple_quoted_code",
                "single_quoted_code",
                "generic_call",
                "fenced_block"
            ]
        );
        assert!(CallCascade::new().extract("clear_timeline(1)").is_none());
    }

    #[test]
    fn test_function_call_prefers_native() {
        let response = NormalizedResponse::assistant(
            "r",
            "m",
            Some("clear_timeline(3)".into()),
            Some(RawFunctionCall::new("get_beats", r#"{"start": 0}"#)),
            Some("function_call".into()),
            Usage::zero(),
        );
        let call = function_call(&response, true).unwrap().unwrap();
        assert_eq!(call.name, "get_beats");

        let text_only = NormalizedResponse::assistant(
            "r",
            "m",
            Some("clear_timeline(3)".into()),
            None,
            None,
            Usage::zero(),
        );
        assert!(function_call(&text_only, false).unwrap().is_none());
        assert_eq!(
            function_call(&text_only, true).unwrap().unwrap().name,
            "clear_timeline"
        );
    }

    #[test]
    fn test_function_call_surfaces_malformed_native_arguments() {
        let response = NormalizedResponse::assistant(
            "r",
            "m",
            None,
            Some(RawFunctionCall::new("create_segment", "not json")),
            None,
            Usage::zero(),
        );
        assert!(function_call(&response, true).is_err());
    }
}
