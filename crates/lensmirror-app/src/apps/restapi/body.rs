//! Response body summaries

use serde_json::Value;

/// Render a response body for display.
///
/// `{state: true, result}` envelopes show just the result, `state: false`
/// shows it as an error. Other JSON is pretty-printed; anything else is
/// returned as-is.
pub fn format_response_body(text: &str, content_type: &str) -> String {
    let Some(parsed) = try_parse_json(text, content_type) else {
        return text.to_string();
    };

    if let Some(record) = parsed.as_object() {
        if let (Some(state), Some(result)) = (record.get("state"), record.get("result")) {
            match state {
                Value::Bool(true) => return format_value(result, true),
                Value::Bool(false) => return format!("Error: {}", format_value(result, false)),
                _ => {}
            }
        }
    }

    serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| text.to_string())
}

fn try_parse_json(text: &str, content_type: &str) -> Option<Value> {
    let trimmed = text.trim();
    let looks_like_json = content_type.contains("application/json")
        || trimmed.starts_with('{')
        || trimmed.starts_with('[');
    if !looks_like_json {
        return None;
    }
    serde_json::from_str(text).ok()
}

fn format_value(value: &Value, pretty: bool) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        _ if pretty => serde_json::to_string_pretty(value).unwrap_or_default(),
        _ => value.to_string(),
    }
}

/// First 200 chars of the body, with `...` when cut.
pub fn preview(body: &str) -> String {
    truncate_chars(body, 200, "...")
}

/// Preview squeezed onto one device line: whitespace runs collapsed, 96 chars.
pub fn compact(preview: &str) -> String {
    let squeezed = preview.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&squeezed, 96, "")
}

pub fn truncate_chars(text: &str, max: usize, ellipsis: &str) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str(ellipsis);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_envelope() {
        assert_eq!(
            format_response_body(r#"{"state":true,"result":"12:30"}"#, "application/json"),
            "12:30"
        );
        assert_eq!(
            format_response_body(r#"{"state":false,"result":{"code":4}}"#, ""),
            r#"Error: {"code":4}"#
        );
        assert_eq!(
            format_response_body(r#"{"state":true,"result":{"on":true}}"#, ""),
            "{\n  \"on\": true\n}"
        );
        assert_eq!(
            format_response_body(r#"{"state":true,"result":null}"#, ""),
            "null"
        );
    }

    #[test]
    fn test_plain_json_is_pretty_printed() {
        assert_eq!(format_response_body("[1,2]", "text/plain"), "[\n  1,\n  2\n]");
    }

    #[test]
    fn test_non_json_passthrough() {
        assert_eq!(format_response_body("OK", "text/plain"), "OK");
        assert_eq!(format_response_body("{broken", "application/json"), "{broken");
    }

    #[test]
    fn test_preview_and_compact() {
        let long = "a ".repeat(150);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 203);

        assert_eq!(compact("line one\n\n  line two"), "line one line two");
        assert_eq!(compact(&"x".repeat(120)).len(), 96);
    }
}
