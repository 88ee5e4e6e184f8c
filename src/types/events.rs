//! Output fragments: the single ordered sequence a run yields to its caller.
//!
//! Plain text and structured lifecycle markers travel in one stream so a
//! renderer observes them in exactly the order they were produced. Renderers
//! that consume a flat text stream can use [`OutputFragment::render_tagged`]
//! to get the markers as self-describing inline JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tools::ToolCallResult;

/// Execution status carried by a tool-call update fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// The call is about to run
    Executing,
    /// The call finished
    Completed {
        /// Wall-clock duration in milliseconds
        duration_ms: u64,
        /// Whether the call failed
        is_error: bool,
    },
}

/// One element of a run's output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputFragment {
    /// Verbatim model text
    Text {
        /// The text delta
        text: String,
    },
    /// A reasoning segment opened
    ThinkingStart {
        /// Segment id, generated once per open
        segment_id: Uuid,
        /// Wall-clock open time
        started_at: DateTime<Utc>,
    },
    /// A reasoning segment closed
    ThinkingEnd {
        /// Segment id matching the start event
        segment_id: Uuid,
        /// How long the segment stayed open
        duration_ms: u64,
    },
    /// Anchors a tool call at its position in the text stream
    ToolCallPosition {
        /// Id shared by all fragments of this call
        call_id: Uuid,
        /// Tool name
        tool_name: String,
    },
    /// Status change for an in-flight tool call
    ToolCallUpdate {
        /// Id shared by all fragments of this call
        call_id: Uuid,
        /// Tool name
        tool_name: String,
        /// New status
        status: ToolCallStatus,
    },
    /// Structured result of a finished tool call, for UI consumption
    ToolCallComplete {
        /// Id shared by all fragments of this call
        call_id: Uuid,
        /// The full result
        result: ToolCallResult,
    },
    /// User-visible note that is not model output (round cap, fallback, errors)
    Notice {
        /// The note
        text: String,
    },
}

impl OutputFragment {
    /// Convenience constructor for text fragments.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text payload, if this is a text fragment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Render as plain text with markers inlined as bracketed JSON.
    ///
    /// Text passes through verbatim; every other variant serializes to
    /// `[[{...}]]` so a downstream renderer can parse markers out of an
    /// otherwise-plain text stream without a side channel.
    pub fn render_tagged(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            other => {
                // Serialization of these variants cannot fail; fall back to
                // an empty marker rather than panicking if it ever does.
                let payload = serde_json::to_string(other).unwrap_or_default();
                format!("[[{payload}]]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_renders_verbatim() {
        let frag = OutputFragment::text("hello [[world]]");
        assert_eq!(frag.render_tagged(), "hello [[world]]");
    }

    #[test]
    fn markers_render_as_bracketed_json() {
        let id = Uuid::new_v4();
        let frag = OutputFragment::ThinkingEnd {
            segment_id: id,
            duration_ms: 1200,
        };
        let rendered = frag.render_tagged();
        assert!(rendered.starts_with("[["));
        assert!(rendered.ends_with("]]"));
        let inner: serde_json::Value =
            serde_json::from_str(&rendered[2..rendered.len() - 2]).unwrap();
        assert_eq!(inner["kind"], "thinking_end");
        assert_eq!(inner["duration_ms"], 1200);
    }

    #[test]
    fn fragments_round_trip_through_serde() {
        let frag = OutputFragment::ToolCallUpdate {
            call_id: Uuid::new_v4(),
            tool_name: "get_weather".into(),
            status: ToolCallStatus::Completed {
                duration_ms: 4,
                is_error: false,
            },
        };
        let json = serde_json::to_string(&frag).unwrap();
        let back: OutputFragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frag);
    }
}
