//! Selection hints and the list-selection resolver
//!
//! List events may carry an index or a label for the row the device thinks
//! is selected. Both are unreliable: indices arrive as numbers or strings,
//! names may be truncated or decorated. [`SelectionHint::extract`] reduces
//! them to an optional in-range index, and [`resolve`] combines that with the
//! gesture to produce the next selection.

use serde_json::{Map, Value};

use crate::events::{CanonicalGesture, RawDeviceEvent};

const RAW_INDEX_KEYS: [&str; 4] = [
    "currentSelectItemIndex",
    "current_select_item_index",
    "currentSelectedIndex",
    "current_selected_index",
];

const RAW_NAME_KEYS: [&str; 4] = [
    "currentSelectItemName",
    "current_select_item_name",
    "currentSelectedName",
    "current_selected_name",
];

/// An optional, already range-checked selection index recovered from an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionHint {
    pub index: Option<usize>,
}

impl SelectionHint {
    pub const NONE: SelectionHint = SelectionHint { index: None };

    pub fn at(index: usize) -> Self {
        Self { index: Some(index) }
    }

    pub fn has_explicit_index(&self) -> bool {
        self.index.is_some()
    }

    /// Extract a hint, matching name hints against `labels`
    /// (exact case-insensitive first, then prefix).
    pub fn extract<S: AsRef<str>>(raw: &RawDeviceEvent, labels: &[S]) -> Self {
        Self::extract_with(raw, labels.len(), |name| match_label(name, labels))
    }

    /// Extract a hint with a caller-supplied name matcher.
    ///
    /// `count` bounds the index; the matcher receives the trimmed, lowercased
    /// name and its result is range-checked as well.
    pub fn extract_with<F>(raw: &RawDeviceEvent, count: usize, match_name: F) -> Self
    where
        F: FnOnce(&str) -> Option<usize>,
    {
        let in_range = |i: usize| i < count;

        let list = raw.list_event();
        let data = raw.json_data();

        if let Some(i) = list
            .and_then(|l| l.get("currentSelectItemIndex"))
            .and_then(parse_index)
            .filter(|i| in_range(*i))
        {
            return Self::at(i);
        }

        if let Some(i) = data
            .and_then(|d| first_present(d, &RAW_INDEX_KEYS))
            .and_then(parse_index)
            .filter(|i| in_range(*i))
        {
            return Self::at(i);
        }

        let from_list = list
            .and_then(|l| l.get("currentSelectItemName"))
            .map(normalize_name)
            .unwrap_or_default();
        let name = if from_list.is_empty() {
            data.and_then(|d| first_present(d, &RAW_NAME_KEYS))
                .map(normalize_name)
                .unwrap_or_default()
        } else {
            from_list
        };

        if name.is_empty() {
            return Self::NONE;
        }

        Self {
            index: match_name(&name).filter(|i| in_range(*i)),
        }
    }
}

/// Exact case-insensitive match, then "incoming name starts with label".
pub fn match_label<S: AsRef<str>>(incoming: &str, labels: &[S]) -> Option<usize> {
    let incoming = incoming.trim().to_lowercase();
    if incoming.is_empty() {
        return None;
    }
    labels
        .iter()
        .position(|l| l.as_ref().to_lowercase() == incoming)
        .or_else(|| {
            labels.iter().position(|l| {
                let label = l.as_ref().to_lowercase();
                !label.is_empty() && incoming.starts_with(&label)
            })
        })
}

/// Compute the next selected index.
///
/// `list_shaped` marks events that came from a list element; an unclassified
/// list event is treated like a click on the hinted row (or row 0). Some
/// simulator builds send the first-row click without event type or index.
pub fn resolve(
    gesture: CanonicalGesture,
    hint: SelectionHint,
    current: usize,
    count: usize,
    list_shaped: bool,
) -> usize {
    if count == 0 {
        return 0;
    }
    let last = count - 1;
    let hinted = hint.index.filter(|i| *i < count);
    let current = current.min(last);

    match gesture {
        CanonicalGesture::SecondaryToggle => current,
        CanonicalGesture::Previous => hinted.unwrap_or_else(|| current.saturating_sub(1)),
        CanonicalGesture::Next => hinted.unwrap_or_else(|| (current + 1).min(last)),
        CanonicalGesture::Primary => hinted.unwrap_or(0),
        CanonicalGesture::Unknown if list_shaped => hinted.unwrap_or(0),
        CanonicalGesture::Unknown => hinted.unwrap_or(current),
    }
}

/// Clamp an index into `0..count` (0 for an empty list).
pub fn clamp_index(index: usize, count: usize) -> usize {
    if count == 0 {
        0
    } else {
        index.min(count - 1)
    }
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

/// Numbers must be non-negative whole numbers; strings parse their leading
/// integer prefix ("3", " 2 ", "4th").
fn parse_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return usize::try_from(u).ok();
            }
            let f = n.as_f64()?;
            (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as usize)
        }
        Value::String(s) => parse_leading_int(s).and_then(|i| usize::try_from(i).ok()),
        _ => None,
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn normalize_name(value: &Value) -> String {
    value
        .as_str()
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CanonicalGesture::*;
    use serde_json::json;

    const THEMES: [&str; 3] = ["Blue", "Green", "Orange"];

    fn hint(value: Value) -> SelectionHint {
        SelectionHint::extract(&RawDeviceEvent::new(value), &THEMES)
    }

    #[test]
    fn test_resolve_next_without_hint() {
        assert_eq!(resolve(Next, SelectionHint::NONE, 2, 5, true), 3);
    }

    #[test]
    fn test_resolve_next_clamps_at_end() {
        assert_eq!(resolve(Next, SelectionHint::NONE, 4, 5, true), 4);
    }

    #[test]
    fn test_resolve_previous_clamps_at_start() {
        assert_eq!(resolve(Previous, SelectionHint::NONE, 0, 5, true), 0);
    }

    #[test]
    fn test_resolve_explicit_hint_wins() {
        assert_eq!(resolve(Previous, SelectionHint::at(0), 3, 5, true), 0);
        assert_eq!(resolve(Next, SelectionHint::at(1), 3, 5, true), 1);
    }

    #[test]
    fn test_resolve_primary_without_hint_is_zero() {
        assert_eq!(resolve(Primary, SelectionHint::NONE, 3, 5, true), 0);
        assert_eq!(resolve(Primary, SelectionHint::at(2), 3, 5, true), 2);
    }

    #[test]
    fn test_resolve_secondary_toggle_keeps_index() {
        assert_eq!(resolve(SecondaryToggle, SelectionHint::at(0), 3, 5, true), 3);
    }

    #[test]
    fn test_resolve_unknown_list_event_falls_back_to_zero() {
        assert_eq!(resolve(Unknown, SelectionHint::NONE, 3, 5, true), 0);
        assert_eq!(resolve(Unknown, SelectionHint::at(4), 3, 5, true), 4);
    }

    #[test]
    fn test_resolve_unknown_non_list_event() {
        assert_eq!(resolve(Unknown, SelectionHint::NONE, 3, 5, false), 3);
        assert_eq!(resolve(Unknown, SelectionHint::at(1), 3, 5, false), 1);
    }

    #[test]
    fn test_resolve_empty_list() {
        for g in [Primary, SecondaryToggle, Previous, Next, Unknown] {
            assert_eq!(resolve(g, SelectionHint::at(2), 7, 0, true), 0);
        }
    }

    #[test]
    fn test_resolve_out_of_range_hint_ignored() {
        assert_eq!(resolve(Next, SelectionHint::at(9), 1, 5, true), 2);
    }

    #[test]
    fn test_resolve_always_in_range() {
        for count in 1..6usize {
            for current in 0..8usize {
                for g in [Primary, SecondaryToggle, Previous, Next, Unknown] {
                    let next = resolve(g, SelectionHint::NONE, current, count, false);
                    assert!(next < count);
                }
            }
        }
    }

    #[test]
    fn test_hint_from_list_index() {
        assert_eq!(hint(json!({ "listEvent": { "currentSelectItemIndex": 2 } })).index, Some(2));
        assert_eq!(hint(json!({ "listEvent": { "currentSelectItemIndex": "1" } })).index, Some(1));
    }

    #[test]
    fn test_hint_negative_or_out_of_range_index_is_absent() {
        assert_eq!(hint(json!({ "listEvent": { "currentSelectItemIndex": -1 } })).index, None);
        assert_eq!(hint(json!({ "listEvent": { "currentSelectItemIndex": 3 } })).index, None);
        assert_eq!(hint(json!({ "listEvent": { "currentSelectItemIndex": "x" } })).index, None);
    }

    #[test]
    fn test_hint_falls_through_to_raw_index() {
        let h = hint(json!({
            "listEvent": { "currentSelectItemIndex": 9 },
            "jsonData": { "current_selected_index": "2" }
        }));
        assert_eq!(h.index, Some(2));
    }

    #[test]
    fn test_hint_from_exact_name() {
        let h = hint(json!({ "listEvent": { "currentSelectItemName": "  GREEN " } }));
        assert_eq!(h.index, Some(1));
    }

    #[test]
    fn test_hint_from_name_prefix() {
        let h = hint(json!({ "jsonData": { "currentSelectedName": "orange (active)" } }));
        assert_eq!(h.index, Some(2));
    }

    #[test]
    fn test_hint_unmatched_name() {
        assert_eq!(hint(json!({ "listEvent": { "currentSelectItemName": "purple" } })).index, None);
        assert_eq!(hint(json!({ "listEvent": {} })).index, None);
    }

    #[test]
    fn test_hint_custom_matcher() {
        let raw = RawDeviceEvent::new(json!({ "listEvent": { "currentSelectItemName": "5 min" } }));
        let h = SelectionHint::extract_with(&raw, 3, |name| (name == "5 min").then_some(1));
        assert_eq!(h.index, Some(1));

        let h = SelectionHint::extract_with(&raw, 1, |_| Some(1));
        assert_eq!(h.index, None);
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("42"), Some(42));
        assert_eq!(parse_leading_int(" 7th"), Some(7));
        assert_eq!(parse_leading_int("-3"), Some(-3));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
    }
}
