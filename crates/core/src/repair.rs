//! Lenient JSON parsing for model output.
//!
//! Models sometimes emit JSON that is almost right: wrapped in a Markdown
//! code fence, with a trailing comma, or cut off before the closing
//! brackets. The repair here only fixes such shallow mistakes, anything
//! else still fails to parse.

use serde_json::Value;

/// Parses `raw` as JSON, repairing it first if the strict parse fails.
///
/// On failure, the error of the strict parse is returned.
pub(crate) fn parse_lenient(raw: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(err) => {
            let repaired = repair(raw);
            trace!("repaired JSON: {repaired}");
            serde_json::from_str(&repaired).map_err(|_| err)
        }
    }
}

/// Removes a surrounding Markdown code fence, if any.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string, such as `json`.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn repair(raw: &str) -> String {
    let text = strip_code_fence(raw);
    let mut out = String::with_capacity(text.len() + 8);
    let mut closers = vec![];
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else {
                match c {
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    '\n' => {
                        out.push_str("\\n");
                        continue;
                    }
                    '\r' => {
                        out.push_str("\\r");
                        continue;
                    }
                    '\t' => {
                        out.push_str("\\t");
                        continue;
                    }
                    _ => {}
                }
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.last() != Some(&c) {
                    // Stray closer.
                    continue;
                }
                closers.pop();
                drop_trailing_comma(&mut out);
            }
            _ => {}
        }
        out.push(c);
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    drop_trailing_comma(&mut out);
    if out.trim_end().ends_with(':') {
        out.push_str("null");
    }
    while let Some(closer) = closers.pop() {
        drop_trailing_comma(&mut out);
        out.push(closer);
    }
    out
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_valid_json_untouched() {
        let value = parse_lenient(r#"{"a": [1, 2], "b": "x,]"}"#).unwrap();
        assert_eq!(value, json!({ "a": [1, 2], "b": "x,]" }));
    }

    #[test]
    fn test_trailing_commas() {
        let value = parse_lenient(r#"{"a": [1, 2,], "b": 3,}"#).unwrap();
        assert_eq!(value, json!({ "a": [1, 2], "b": 3 }));
    }

    #[test]
    fn test_truncated() {
        let raw = r#"{"location": "Albuquerque", "days": [1, 2"#;
        let value = parse_lenient(raw).unwrap();
        assert_eq!(value, json!({ "location": "Albuquerque", "days": [1, 2] }));

        let value = parse_lenient(r#"{"location": "Albu"#).unwrap();
        assert_eq!(value, json!({ "location": "Albu" }));

        let value = parse_lenient(r#"{"location":"#).unwrap();
        assert_eq!(value, json!({ "location": null }));
    }

    #[test]
    fn test_code_fence() {
        let raw = "```json\n{\"answer\": 42}\n```";
        assert_eq!(parse_lenient(raw).unwrap(), json!({ "answer": 42 }));
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence(" {} "), "{}");
    }

    #[test]
    fn test_raw_control_characters_in_string() {
        let raw = "{\"text\": \"line one\nline two\"}";
        let value = parse_lenient(raw).unwrap();
        assert_eq!(value, json!({ "text": "line one\nline two" }));
    }

    #[test]
    fn test_stray_closer() {
        let value = parse_lenient(r#"{"a": 1}}"#).unwrap();
        assert_eq!(value, json!({ "a": 1 }));
    }

    #[test]
    fn test_hopeless_input() {
        assert!(parse_lenient("the weather is nice").is_err());
        assert!(parse_lenient(r#"{"a" 1}"#).is_err());
    }
}
