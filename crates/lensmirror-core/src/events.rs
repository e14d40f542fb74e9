//! Device event normalization
//!
//! The bridge delivers events in several shapes depending on which element
//! emitted them (`listEvent`, `textEvent`, `sysEvent`) and on firmware or
//! simulator version (a flat `eventType`, or a `jsonData` blob with varying
//! key spellings). Everything funnels through [`normalize`] into the closed
//! [`CanonicalGesture`] set before any app logic runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys checked on the `jsonData` blob, in priority order.
const RAW_TYPE_KEYS: [&str; 4] = ["eventType", "event_type", "Event_Type", "type"];

/// The small gesture vocabulary the device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalGesture {
    /// Single tap / click
    Primary,
    /// Double tap
    SecondaryToggle,
    /// Scroll towards the top of a list
    Previous,
    /// Scroll towards the bottom of a list
    Next,
    /// Anything the normalizer could not classify
    Unknown,
}

impl CanonicalGesture {
    /// Short label used in status lines and logs.
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalGesture::Primary => "click",
            CanonicalGesture::SecondaryToggle => "double-click",
            CanonicalGesture::Previous => "scroll-up",
            CanonicalGesture::Next => "scroll-down",
            CanonicalGesture::Unknown => "unknown",
        }
    }
}

/// System lifecycle notifications carried in the same event-type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    ForegroundEnter,
    ForegroundExit,
    AbnormalExit,
}

/// A raw event as received from the bridge. Read-only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDeviceEvent(pub Value);

impl RawDeviceEvent {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a JSON line into a raw event.
    pub fn parse(json: &str) -> crate::Result<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }

    /// Build a synthetic `sysEvent` carrying the given event type.
    pub fn system(event_type: &str) -> Self {
        Self(serde_json::json!({ "sysEvent": { "eventType": event_type } }))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// `listEvent` object, if the event came from a list element.
    pub fn list_event(&self) -> Option<&Map<String, Value>> {
        self.0.get("listEvent").and_then(Value::as_object)
    }

    /// Embedded `jsonData` blob, if any.
    pub fn json_data(&self) -> Option<&Map<String, Value>> {
        self.0.get("jsonData").and_then(Value::as_object)
    }

    /// True if a `listEvent` object is present.
    pub fn is_list_shaped(&self) -> bool {
        self.list_event().is_some()
    }

    /// The first present (non-null) event-type code, following the bridge's
    /// precedence order.
    pub fn raw_type(&self) -> Option<&Value> {
        let nested = ["listEvent", "textEvent", "sysEvent"]
            .into_iter()
            .filter_map(|key| self.0.get(key))
            .filter_map(|obj| obj.get("eventType"));

        let flat = self.0.get("eventType").into_iter();

        let data = self
            .json_data()
            .into_iter()
            .flat_map(|data| RAW_TYPE_KEYS.into_iter().filter_map(|key| data.get(key)));

        nested.chain(flat).chain(data).find(|v| !v.is_null())
    }
}

/// Map a raw event onto the closed gesture set.
///
/// Total: malformed or unrecognized payloads yield [`CanonicalGesture::Unknown`].
pub fn normalize(raw: &RawDeviceEvent) -> CanonicalGesture {
    match raw.raw_type() {
        Some(code) => normalize_code(code),
        None => CanonicalGesture::Unknown,
    }
}

/// Map a single event-type code onto the gesture set.
pub fn normalize_code(code: &Value) -> CanonicalGesture {
    match code {
        Value::Number(n) => match as_whole_number(n) {
            Some(0) => CanonicalGesture::Primary,
            Some(1) => CanonicalGesture::Previous,
            Some(2) => CanonicalGesture::Next,
            Some(3) => CanonicalGesture::SecondaryToggle,
            _ => CanonicalGesture::Unknown,
        },
        Value::String(s) => {
            let upper = s.to_uppercase();
            // DOUBLE must win over CLICK ("DOUBLE_CLICK_EVENT" contains both)
            if upper.contains("DOUBLE") {
                CanonicalGesture::SecondaryToggle
            } else if upper.contains("CLICK") {
                CanonicalGesture::Primary
            } else if upper.contains("SCROLL_TOP") || upper.contains("UP") {
                CanonicalGesture::Previous
            } else if upper.contains("SCROLL_BOTTOM") || upper.contains("DOWN") {
                CanonicalGesture::Next
            } else {
                CanonicalGesture::Unknown
            }
        }
        _ => CanonicalGesture::Unknown,
    }
}

/// Recognise lifecycle signals (foreground enter/exit, abnormal exit).
///
/// Numeric codes follow the bridge's event-type table (4, 5, 6); string codes
/// are matched case-insensitively by substring.
pub fn lifecycle(raw: &RawDeviceEvent) -> Option<LifecycleSignal> {
    match raw.raw_type()? {
        Value::Number(n) => match as_whole_number(n)? {
            4 => Some(LifecycleSignal::ForegroundEnter),
            5 => Some(LifecycleSignal::ForegroundExit),
            6 => Some(LifecycleSignal::AbnormalExit),
            _ => None,
        },
        Value::String(s) => {
            let upper = s.to_uppercase();
            if upper.contains("ABNORMAL_EXIT") {
                Some(LifecycleSignal::AbnormalExit)
            } else if upper.contains("FOREGROUND_ENTER") {
                Some(LifecycleSignal::ForegroundEnter)
            } else if upper.contains("FOREGROUND_EXIT") {
                Some(LifecycleSignal::ForegroundExit)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn as_whole_number(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
