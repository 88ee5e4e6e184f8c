//! Thinking/reasoning segmenter.
//!
//! Stateful scanner that brackets "reasoning" spans in the streamed text with
//! lifecycle events. Classification is advisory: the orchestrator still
//! forwards reasoning text to the caller, the segmenter only marks where a
//! segment opens and closes. The one deliberate content edit in the system
//! (truncating at the close marker) lives in the orchestrator's sub-round
//! finalization, not here.

use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::types::OutputFragment;

/// Marker opening a reasoning segment.
pub const THINK_OPEN: &str = "<think>";
/// Marker closing a reasoning segment.
pub const THINK_CLOSE: &str = "</think>";

/// Scanner state threaded across a whole model stream.
///
/// Markers may arrive split across fragments, so the scanner keeps a small
/// tail buffer of unmatched text and always matches against the cumulative
/// content rather than the latest fragment in isolation.
#[derive(Debug, Default)]
pub struct ThinkingSegmenter {
    in_segment: bool,
    segment_id: Option<Uuid>,
    started_at: Option<Instant>,
    pending: String,
}

impl ThinkingSegmenter {
    /// Create a fresh scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scanner is currently inside a reasoning segment.
    pub fn in_segment(&self) -> bool {
        self.in_segment
    }

    /// Scan one incoming text fragment and return the lifecycle events it
    /// triggered, in order. The fragment text itself is not modified or
    /// withheld; the caller forwards it separately.
    pub fn process_fragment(&mut self, text: &str) -> Vec<OutputFragment> {
        self.pending.push_str(text);
        let mut events = Vec::new();
        let mut cursor = 0;

        loop {
            let marker = if self.in_segment { THINK_CLOSE } else { THINK_OPEN };
            let Some(rel) = self.pending[cursor..].find(marker) else {
                break;
            };
            cursor += rel + marker.len();
            if self.in_segment {
                let segment_id = self.segment_id.take().unwrap_or_else(Uuid::new_v4);
                let duration_ms = self
                    .started_at
                    .take()
                    .map(|t| t.elapsed().as_millis() as u64)
                    .unwrap_or(0);
                self.in_segment = false;
                events.push(OutputFragment::ThinkingEnd {
                    segment_id,
                    duration_ms,
                });
            } else {
                let segment_id = Uuid::new_v4();
                self.segment_id = Some(segment_id);
                self.started_at = Some(Instant::now());
                self.in_segment = true;
                events.push(OutputFragment::ThinkingStart {
                    segment_id,
                    started_at: Utc::now(),
                });
            }
        }

        // Keep only a tail that could still be a partial marker. Markers are
        // ASCII, but the surrounding text need not be, so cut on a char
        // boundary.
        let rest = &self.pending[cursor..];
        let mut start = rest.len().saturating_sub(THINK_CLOSE.len() - 1);
        while !rest.is_char_boundary(start) {
            start += 1;
        }
        self.pending = rest[start..].to_string();

        events
    }

    /// Close a segment left open at run end, if any. No run reports an open
    /// segment as part of its final state.
    pub fn force_close(&mut self) -> Option<OutputFragment> {
        if !self.in_segment {
            return None;
        }
        let segment_id = self.segment_id.take().unwrap_or_else(Uuid::new_v4);
        let duration_ms = self
            .started_at
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.in_segment = false;
        Some(OutputFragment::ThinkingEnd {
            segment_id,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(events: &[OutputFragment]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, OutputFragment::ThinkingStart { .. }))
            .count()
    }

    fn ends(events: &[OutputFragment]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, OutputFragment::ThinkingEnd { .. }))
            .count()
    }

    #[test]
    fn brackets_a_segment_in_one_fragment() {
        let mut seg = ThinkingSegmenter::new();
        let events = seg.process_fragment("<think>pondering</think>answer");
        assert_eq!(starts(&events), 1);
        assert_eq!(ends(&events), 1);
        assert!(!seg.in_segment());
    }

    #[test]
    fn start_and_end_share_the_segment_id() {
        let mut seg = ThinkingSegmenter::new();
        let mut events = seg.process_fragment("<think>a");
        events.extend(seg.process_fragment("b</think>"));
        let start_id = events.iter().find_map(|e| match e {
            OutputFragment::ThinkingStart { segment_id, .. } => Some(*segment_id),
            _ => None,
        });
        let end_id = events.iter().find_map(|e| match e {
            OutputFragment::ThinkingEnd { segment_id, .. } => Some(*segment_id),
            _ => None,
        });
        assert_eq!(start_id, end_id);
        assert!(start_id.is_some());
    }

    #[test]
    fn handles_marker_split_across_fragments() {
        let mut seg = ThinkingSegmenter::new();
        assert_eq!(starts(&seg.process_fragment("before <thi")), 0);
        assert_eq!(starts(&seg.process_fragment("nk>inside")), 1);
        assert!(seg.in_segment());
        assert_eq!(ends(&seg.process_fragment("done</th")), 0);
        assert_eq!(ends(&seg.process_fragment("ink> after")), 1);
        assert!(!seg.in_segment());
    }

    #[test]
    fn near_miss_partial_marker_does_not_open() {
        let mut seg = ThinkingSegmenter::new();
        seg.process_fragment("<thinker");
        let events = seg.process_fragment("> more");
        assert_eq!(starts(&events), 0);
        assert!(!seg.in_segment());
    }

    #[test]
    fn close_without_open_is_ignored() {
        let mut seg = ThinkingSegmenter::new();
        let events = seg.process_fragment("text </think> more");
        assert!(events.is_empty());
        assert!(!seg.in_segment());
    }

    #[test]
    fn open_inside_open_segment_is_ignored() {
        let mut seg = ThinkingSegmenter::new();
        let events = seg.process_fragment("<think>a<think>b</think>");
        assert_eq!(starts(&events), 1);
        assert_eq!(ends(&events), 1);
    }

    #[test]
    fn multiple_segments_in_one_stream() {
        let mut seg = ThinkingSegmenter::new();
        let mut events = seg.process_fragment("<think>a</think>mid<think>b");
        events.extend(seg.process_fragment("</think>tail"));
        assert_eq!(starts(&events), 2);
        assert_eq!(ends(&events), 2);
    }

    #[test]
    fn force_close_ends_an_open_segment() {
        let mut seg = ThinkingSegmenter::new();
        seg.process_fragment("<think>never closed");
        let closed = seg.force_close();
        assert!(matches!(closed, Some(OutputFragment::ThinkingEnd { .. })));
        assert!(!seg.in_segment());
        assert!(seg.force_close().is_none());
    }

    #[test]
    fn non_ascii_text_around_markers() {
        let mut seg = ThinkingSegmenter::new();
        let mut events = seg.process_fragment("héllo <think>思考");
        events.extend(seg.process_fragment("中</think> déjà"));
        assert_eq!(starts(&events), 1);
        assert_eq!(ends(&events), 1);
    }
}
