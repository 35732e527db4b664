//! Structured-output recovery from captured stdout
//!
//! Generated programs are asked to print their results as one JSON object,
//! usually after assorted progress chatter. We scan for top-level `{...}`
//! spans with a depth counter (string literals inside an object are skipped
//! so braces in values do not confuse it) and return the last span that
//! parses as a JSON object.

use serde_json::{Map, Value};

/// Byte ranges of every top-level brace-balanced span, in order
fn top_level_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            // stray closers outside any object are noise
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push((s, i));
                    }
                }
            }
            _ => {}
        }
    }

    spans
}

/// The last complete JSON object printed in `text`, if any
pub fn last_json_object(text: &str) -> Option<Map<String, Value>> {
    top_level_spans(text).into_iter().rev().find_map(|(s, e)| {
        match serde_json::from_str::<Value>(&text[s..=e]) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}
