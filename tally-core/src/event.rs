//! Event records and property merging
//!
//! An `EventRecord` is built per `track` call, handed to the dispatcher and
//! dropped once serialized. Its JSON shape is what the collection endpoint
//! expects in the `event` form field:
//!
//! ```text
//! { "user_id", "insert_id", "event_type", "time", "event_properties", "session_id"? }
//! ```

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Arbitrary event properties keyed by name
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// One analytics event, ready for dispatch
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// User the event belongs to
    pub user_id: String,

    /// Random per-send id used by the server for deduplication
    pub insert_id: String,

    /// Event name
    pub event_type: String,

    /// Epoch milliseconds when the record was built
    pub time: i64,

    /// Merged explicit and persistent properties
    pub event_properties: Properties,

    /// Epoch milliseconds of the active session start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
}

impl EventRecord {
    /// Build a record stamped with the current time and a fresh insert id
    ///
    /// A `session_start` of zero or less means no session is active.
    pub fn new(
        user_id: impl Into<String>,
        event_type: impl Into<String>,
        event_properties: Properties,
        session_start: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            insert_id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            time: now_millis(),
            event_properties,
            session_id: (session_start > 0).then_some(session_start),
        }
    }
}

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Merge explicit properties over persistent ones
///
/// Explicit values win on key collision. Neither input is modified.
pub fn merge_properties(
    explicit: Option<&Properties>,
    persistent: Option<&Properties>,
) -> Properties {
    let mut merged = explicit.cloned().unwrap_or_default();

    if let Some(persistent) = persistent {
        for (key, value) in persistent {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    merged
}
