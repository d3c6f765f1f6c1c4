//! Tool-call extraction from free-form model output
//!
//! Models announce tool calls in several textual shapes. `extract` recognizes
//! five of them, scanned in this order over the same normalized text
//! (backticks replaced by double quotes):
//!
//! 1. standalone `{"name": "...", "arguments": {...}}`
//! 2. standalone `{"name": "..."}`
//! 3. arrays `[{"name": ..., "arguments": ...}, ...]`
//! 4. bracket calls `["tool_name"]({...})`
//! 5. tagged calls `<tool_call>{...}</tool_call>`, possibly spanning lines
//!
//! Calls are returned grouped by the form they were found in (all form 1
//! calls, then form 2, ...), left to right within a form. A match lying
//! inside a larger match (a standalone object inside a tag, an array inside
//! another call's arguments) is not reported separately.

use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::LazyLock;

use crate::core::ToolCall;

static RE_STANDALONE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"name"\s*:\s*"([^"]+)"\s*,\s*"arguments"\s*:\s*"#).unwrap()
});
static RE_FLAT_ARGS_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\{[^}]*\}\s*\}"#).unwrap());
static RE_STANDALONE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*"name"\s*:\s*"([^"]+)"\s*\}"#).unwrap());
static RE_ARRAY_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\s*\{").unwrap());
static RE_BRACKET_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\["([^"]+)"\]\(\s*(\{.*?\})\s*\)"#).unwrap());
static RE_TAGGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>\s*(\{.*?\})\s*</tool_call>").unwrap());

/// Textual shape a call was found in, in scan order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Form {
    Standalone,
    StandaloneBare,
    Array,
    BracketCall,
    Tagged,
}

/// A match over the normalized text
#[derive(Debug)]
struct Candidate {
    form: Form,
    span: Range<usize>,
    calls: Vec<ToolCall>,
}

impl Candidate {
    fn new(form: Form, span: Range<usize>, calls: Vec<ToolCall>) -> Self {
        Self { form, span, calls }
    }

    /// Strictly inside `other`
    fn is_nested_in(&self, other: &Candidate) -> bool {
        other.span.start <= self.span.start
            && self.span.end <= other.span.end
            && other.span != self.span
    }

    /// Arrays, bracket calls and tagged spans enclose other calls
    fn is_container(&self) -> bool {
        matches!(self.form, Form::Array | Form::BracketCall | Form::Tagged)
    }

    fn overlaps(&self, other: &Candidate) -> bool {
        self.span.start < other.span.end && other.span.start < self.span.end
    }
}

/// Extract every recognizable tool call from `text`.
///
/// Never fails: malformed fragments are skipped, and a fragment that is
/// recognizable but carries unparsable arguments yields a call with empty
/// arguments.
pub fn extract(text: &str) -> Vec<ToolCall> {
    let normalized = text.replace('`', "\"");

    let mut candidates = Vec::new();
    candidates.extend(scan_standalone(&normalized));
    candidates.extend(scan_standalone_bare(&normalized));
    candidates.extend(scan_arrays(&normalized));
    candidates.extend(scan_bracket_calls(&normalized));
    candidates.extend(scan_tagged(&normalized));

    let keep: Vec<bool> = candidates
        .iter()
        .map(|c| !candidates.iter().any(|other| c.is_nested_in(other)))
        .collect();

    let mut accepted: Vec<&Candidate> = candidates
        .iter()
        .zip(keep)
        .filter_map(|(c, keep)| keep.then_some(c))
        .collect();

    // A container straddling the end of an earlier one is dropped
    accepted.sort_by_key(|c| c.span.start);
    let mut containers: Vec<&Candidate> = Vec::new();
    accepted.retain(|c| {
        if !c.is_container() {
            return true;
        }
        if containers.iter().any(|earlier| earlier.overlaps(c)) {
            return false;
        }
        containers.push(*c);
        true
    });
    accepted.sort_by_key(|c| (c.form, c.span.start));

    let mut calls: Vec<ToolCall> = Vec::new();
    let mut with_arguments: Vec<&str> = Vec::new();

    for candidate in &accepted {
        for call in &candidate.calls {
            match candidate.form {
                Form::Standalone => with_arguments.push(&call.name),
                Form::StandaloneBare if with_arguments.contains(&call.name.as_str()) => {
                    continue;
                }
                _ => {}
            }
            calls.push(call.clone());
        }
    }

    tracing::debug!(count = calls.len(), "Extracted tool calls");
    calls
}

/// Parse one JSON value at the start of `text`, returning it with the
/// number of bytes it occupied.
fn parse_prefix(text: &str) -> Option<(Value, usize)> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Some((value, stream.byte_offset())),
        _ => None,
    }
}

fn preceded_by(text: &str, pos: usize, ch: char) -> bool {
    text[..pos].ends_with(ch)
}

fn followed_by(text: &str, pos: usize, ch: char) -> bool {
    text[pos..].starts_with(ch)
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

/// Arguments value written either as an object or as a string holding one
fn arguments_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::String(raw) => serde_json::from_str(&raw).ok(),
        _ => None,
    }
}

fn scan_standalone(text: &str) -> Vec<Candidate> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(caps) = RE_STANDALONE_HEAD.captures_at(text, pos) {
        let (Some(head), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        pos = head.end();

        if preceded_by(text, head.start(), '[') {
            continue;
        }

        let args_start = head.end();
        let parsed = parse_prefix(&text[args_start..])
            .and_then(|(value, len)| arguments_object(value).map(|map| (map, args_start + len)));

        let (arguments, close) = match parsed {
            Some((map, args_end)) => {
                let close = skip_whitespace(text, args_end);
                if !followed_by(text, close, '}') {
                    continue;
                }
                (map, close)
            }
            // Recognizable shape with arguments that don't parse
            None => match RE_FLAT_ARGS_TAIL.find(&text[args_start..]) {
                Some(tail) => (Map::new(), args_start + tail.end() - 1),
                None => continue,
            },
        };

        let end = close + 1;
        if followed_by(text, end, ']') {
            continue;
        }

        pos = end;
        found.push(Candidate::new(
            Form::Standalone,
            head.start()..end,
            vec![ToolCall::new(name.as_str(), arguments)],
        ));
    }

    found
}

fn scan_standalone_bare(text: &str) -> Vec<Candidate> {
    RE_STANDALONE_BARE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            if preceded_by(text, whole.start(), '[') || followed_by(text, whole.end(), ']') {
                return None;
            }
            Some(Candidate::new(
                Form::StandaloneBare,
                whole.range(),
                vec![ToolCall::bare(name.as_str())],
            ))
        })
        .collect()
}

fn scan_arrays(text: &str) -> Vec<Candidate> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(start) = RE_ARRAY_START.find_at(text, pos) {
        let open = start.start();
        pos = open + 1;

        let Some((Value::Array(items), len)) = parse_prefix(&text[open..]) else {
            continue;
        };

        let calls: Vec<ToolCall> = items.iter().filter_map(ToolCall::from_value).collect();
        if calls.is_empty() {
            continue;
        }

        pos = open + len;
        found.push(Candidate::new(Form::Array, open..open + len, calls));
    }

    found
}

fn scan_bracket_calls(text: &str) -> Vec<Candidate> {
    RE_BRACKET_CALL
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str();
            let body = caps.get(2)?.as_str();

            let call = match serde_json::from_str::<Value>(body) {
                Ok(value) => bracket_body_call(name, value)?,
                Err(_) => ToolCall::bare(name),
            };
            Some(Candidate::new(Form::BracketCall, whole.range(), vec![call]))
        })
        .collect()
}

/// The body of a bracket call is usually a full call object; an object
/// without `name` is taken as the arguments of the bracketed name.
fn bracket_body_call(name: &str, value: Value) -> Option<ToolCall> {
    if let Some(call) = ToolCall::from_value(&value) {
        return Some(call);
    }
    let mut obj = match value {
        Value::Object(obj) => obj,
        _ => return None,
    };
    if obj.contains_key("name") {
        return None;
    }
    let arguments = match obj.remove("arguments") {
        Some(args) => arguments_object(args).unwrap_or_default(),
        None => obj,
    };
    Some(ToolCall::new(name, arguments))
}

fn scan_tagged(text: &str) -> Vec<Candidate> {
    RE_TAGGED
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value: Value = serde_json::from_str(caps.get(1)?.as_str()).ok()?;
            let call = ToolCall::from_value(&value)?;
            Some(Candidate::new(Form::Tagged, whole.range(), vec![call]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(calls: &[ToolCall]) -> Vec<&str> {
        calls.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_standalone_with_empty_arguments() {
        let calls = extract(r#"{"name": "get_current_time", "arguments": {}}"#);
        assert_eq!(calls, vec![ToolCall::bare("get_current_time")]);
    }

    #[test]
    fn test_standalone_with_arguments() {
        let calls = extract(r#"{"name": "test_func", "arguments": {"param1": "value1", "param2": 42}}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["param1"], json!("value1"));
        assert_eq!(calls[0].arguments["param2"], json!(42));
    }

    #[test]
    fn test_standalone_nested_arguments() {
        let calls = extract(
            r#"Sure. {"name": "search", "arguments": {"filter": {"lang": "rust"}, "tags": ["a", "b"]}} done"#,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["filter"], json!({"lang": "rust"}));
        assert_eq!(calls[0].arguments["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_standalone_unparsable_arguments_fall_back_to_empty() {
        let calls = extract(r#"{"name": "broken", "arguments": {"a": nope}}"#);
        assert_eq!(calls, vec![ToolCall::bare("broken")]);
    }

    #[test]
    fn test_standalone_without_arguments() {
        let calls = extract(r#"{"name": "simple_tool"}"#);
        assert_eq!(calls, vec![ToolCall::bare("simple_tool")]);
    }

    #[test]
    fn test_standalone_in_conversation() {
        let calls = extract(
            r#"Let me check the time for you. {"name": "get_current_time", "arguments": {}} I will get that information."#,
        );
        assert_eq!(names(&calls), vec!["get_current_time"]);
    }

    #[test]
    fn test_multiple_standalone_calls() {
        let calls = extract(
            r#"First call: {"name": "func1", "arguments": {}} and second: {"name": "func2", "arguments": {}}"#,
        );
        assert_eq!(names(&calls), vec!["func1", "func2"]);
    }

    #[test]
    fn test_bare_skipped_when_name_has_arguments_form() {
        let calls = extract(
            r#"{"name": "remember", "arguments": {"content": "x"}} and again {"name": "remember"}"#,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get_string("content").as_deref(), Some("x"));
    }

    #[test]
    fn test_array_form() {
        let calls = extract(r#"[{"name": "tool1", "arguments": {}}, {"name": "tool2", "arguments": {}}]"#);
        assert_eq!(names(&calls), vec!["tool1", "tool2"]);
    }

    #[test]
    fn test_array_middle_element_not_duplicated() {
        let calls = extract(
            r#"[{"name": "a", "arguments": {}}, {"name": "b", "arguments": {}}, {"name": "c"}]"#,
        );
        assert_eq!(names(&calls), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_array_single_element_defaults_arguments() {
        let calls = extract(r#"Calling [{"name": "ping"}] now"#);
        assert_eq!(calls, vec![ToolCall::bare("ping")]);
    }

    #[test]
    fn test_array_skips_nameless_items() {
        let calls = extract(r#"[{"name": "ok", "arguments": {"n": 1}}, {"foo": 1}, 3]"#);
        assert_eq!(names(&calls), vec!["ok"]);
    }

    #[test]
    fn test_bracket_call_form() {
        let calls = extract(
            r#"["get_weather"]({"name": "get_weather", "arguments": {"city": "Paris"}})"#,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].get_string("city").as_deref(), Some("Paris"));
    }

    #[test]
    fn test_bracket_call_unparsable_body_keeps_name() {
        let calls = extract(r#"["get_weather"]({"name": get_weather})"#);
        assert_eq!(calls, vec![ToolCall::bare("get_weather")]);
    }

    #[test]
    fn test_bracket_call_body_as_arguments() {
        let calls = extract(r#"["get_weather"]({"city": "Oslo"})"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].get_string("city").as_deref(), Some("Oslo"));
    }

    #[test]
    fn test_tagged_form_multiline() {
        let calls = extract(
            "<tool_call>\n{\"name\": \"getCurrentTime\", \"arguments\": {}}\n</tool_call>",
        );
        assert_eq!(calls, vec![ToolCall::bare("getCurrentTime")]);
    }

    #[test]
    fn test_partially_overlapping_containers_keep_the_earlier() {
        let text = r#"["a"]({"x": "<tool_call>{"}) and ": 1, "name": "b", "arguments": {}}</tool_call>"#;
        let calls = extract(text);
        assert_eq!(names(&calls), vec!["a"]);
        assert_eq!(calls[0].arguments["x"], json!("<tool_call>{"));
    }

    #[test]
    fn test_tagged_malformed_is_skipped() {
        let calls = extract("<tool_call>{\"name\": oops}</tool_call> nothing else");
        assert!(calls.is_empty());
    }

    #[test]
    fn test_backticks_normalized() {
        let calls = extract("{`name`: `getCurrentTime`, `arguments`: {}}");
        assert_eq!(calls, vec![ToolCall::bare("getCurrentTime")]);
    }

    #[test]
    fn test_no_calls() {
        assert!(extract("The current time is 14:30").is_empty());
        assert!(extract("").is_empty());
        assert!(extract("{\"title\": \"x\"} [1, 2] <tool_call></tool_call>").is_empty());
    }

    #[test]
    fn test_same_call_in_every_form() {
        let inner = r#"{"name": "lookup", "arguments": {"q": "rust", "n": 2}}"#;
        let forms = [
            format!("Here: {} ok", inner),
            format!("[{}]", inner),
            format!(r#"["lookup"]({})"#, inner),
            format!("<tool_call>\n{}\n</tool_call>", inner),
        ];
        for text in &forms {
            let calls = extract(text);
            assert_eq!(calls.len(), 1, "form: {}", text);
            assert_eq!(calls[0].name, "lookup");
            assert_eq!(calls[0].arguments["q"], json!("rust"));
            assert_eq!(calls[0].arguments["n"], json!(2));
        }

        let bare = extract(r#"{"name": "lookup"}"#);
        assert_eq!(bare, vec![ToolCall::bare("lookup")]);
    }

    #[test]
    fn test_form_major_ordering() {
        let text = concat!(
            "<tool_call>{\"name\": \"tagged\", \"arguments\": {}}</tool_call> ",
            "[{\"name\": \"in_array\"}] ",
            "{\"name\": \"standalone\", \"arguments\": {}}"
        );
        assert_eq!(names(&extract(text)), vec!["standalone", "in_array", "tagged"]);
    }

    #[test]
    fn test_arguments_order_preserved() {
        let calls = extract(r#"{"name": "f", "arguments": {"z": 1, "a": 2, "m": 3}}"#);
        let keys: Vec<&str> = calls[0].arguments.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
