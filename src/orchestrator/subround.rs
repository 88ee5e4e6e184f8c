//! Streaming sub-round primitive shared by the multi-round policies.
//!
//! One sub-round opens a model stream against the current transcript, forwards
//! fragments (bracketed by the segmenter) to the caller, watches for its
//! configured stop conditions, and appends the resulting assistant message.
//! Stops request an abort on the underlying stream but keep draining whatever
//! is already buffered; abort is requested, never assumed instantaneous.

use futures::StreamExt;

use crate::error::OrchestrationError;
use crate::executor::ToolCallExecutor;
use crate::segmenter::THINK_CLOSE;
use crate::stream::ModelStreamClient;
use crate::types::{ConversationMessage, OutputFragment, ToolCallRequest, ToolDefinition};

use super::RunState;

/// What ends a sub-round before the stream's natural completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopCondition {
    /// Stop once the model requests at least one tool call
    pub stop_on_tool_call: bool,
    /// Stop once a reasoning segment's close marker appears
    pub stop_on_reasoning_complete: bool,
}

impl StopCondition {
    /// Run the stream to natural completion.
    pub fn none() -> Self {
        Self::default()
    }

    /// Stop on the first tool-call request.
    pub fn on_tool_call() -> Self {
        Self {
            stop_on_tool_call: true,
            ..Self::default()
        }
    }

    /// Stop when the reasoning close marker appears.
    pub fn on_reasoning_complete() -> Self {
        Self {
            stop_on_reasoning_complete: true,
            ..Self::default()
        }
    }
}

/// Why a sub-round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stream completed on its own
    NaturalEnd,
    /// A tool-call stop condition fired
    ToolCall,
    /// A reasoning-complete stop condition fired
    ReasoningComplete,
    /// The cancellation token fired mid-stream
    Cancelled,
}

/// Post-processed result of one sub-round.
#[derive(Debug, Clone)]
pub struct SubRoundOutcome {
    /// Final (possibly truncated) assistant content
    pub content: String,
    /// Tool-call requests detected during the stream, in emission order
    pub tool_calls: Vec<ToolCallRequest>,
    /// Whether a stop condition or cancellation cut the stream short
    pub stopped: bool,
    /// Why the sub-round ended
    pub stop_reason: StopReason,
}

/// Truncation applied once at sub-round completion.
///
/// When the stop reason is reasoning completion, the content ends exactly at
/// (and including) the close marker; anything the raw stream emitted after it
/// is discarded. This is the one deliberate content edit in the system.
pub fn finalize_content(raw: &str, reason: StopReason) -> String {
    if reason == StopReason::ReasoningComplete {
        if let Some(pos) = raw.find(THINK_CLOSE) {
            return raw[..pos + THINK_CLOSE.len()].to_string();
        }
    }
    raw.to_string()
}

/// Run one streaming sub-round against the current transcript.
///
/// With `inline` set (sequential-inline policy), tool calls are executed as
/// they arrive without aborting the stream; their tool messages are staged and
/// appended right after this round's assistant message so the transcript keeps
/// the assistant-before-tool ordering.
///
/// Errors are only returned for fatal stream failures and for a dropped
/// output stream (`Aborted`); abort-induced stream errors are drained as
/// normal completion.
pub(crate) async fn run_sub_round(
    client: &dyn ModelStreamClient,
    model: &str,
    state: &mut RunState,
    tools: Option<Vec<ToolDefinition>>,
    stop: StopCondition,
    inline: Option<&ToolCallExecutor>,
) -> Result<SubRoundOutcome, OrchestrationError> {
    let handle = client
        .stream_chat(model, state.transcript.clone(), tools)
        .await?;
    state.token.attach(handle.abort.clone());
    let mut stream = handle.stream;
    let abort = handle.abort;

    let mut content = String::new();
    let mut detected: Vec<ToolCallRequest> = Vec::new();
    let mut staged: Vec<ConversationMessage> = Vec::new();
    let mut stop_reason = StopReason::NaturalEnd;
    let mut stop_triggered = false;

    while let Some(item) = stream.next().await {
        if state.token.is_cancelled() {
            abort.abort();
            stop_reason = StopReason::Cancelled;
            stop_triggered = true;
            break;
        }
        let fragment = match item {
            Ok(fragment) => fragment,
            // Abort-induced end is expected control flow, not an error.
            Err(e) if e.is_aborted() => break,
            Err(e) => return Err(e),
        };

        if let Some(text) = fragment.text_delta {
            let events = state.segmenter.process_fragment(&text);
            let mut reasoning_closed = false;
            for event in events {
                reasoning_closed |= matches!(event, OutputFragment::ThinkingEnd { .. });
                state.send(event).await?;
            }
            state.send(OutputFragment::Text { text: text.clone() }).await?;
            content.push_str(&text);

            if stop.stop_on_reasoning_complete && reasoning_closed && !stop_triggered {
                stop_triggered = true;
                stop_reason = StopReason::ReasoningComplete;
                abort.abort();
                // keep draining buffered fragments
            }
        }

        if let Some(calls) = fragment.tool_calls {
            if !calls.is_empty() {
                if let Some(executor) = inline {
                    // Execute immediately, deduplicated per run; results are
                    // staged behind this round's assistant message.
                    let fresh: Vec<ToolCallRequest> = calls
                        .iter()
                        .filter(|c| state.executed.insert(c.identity_key()))
                        .cloned()
                        .collect();
                    if !fresh.is_empty() {
                        executor
                            .execute_all(
                                &fresh,
                                &mut staged,
                                &state.context,
                                &state.token,
                                &state.out,
                            )
                            .await?;
                    }
                }
                detected.extend(calls);
                if stop.stop_on_tool_call && !stop_triggered {
                    stop_triggered = true;
                    stop_reason = StopReason::ToolCall;
                    abort.abort();
                }
            }
        }
    }

    // An abort-honoring stream may simply end once the cancel fires, without
    // yielding another item for the in-loop check to see.
    if state.token.is_cancelled() && !stop_triggered {
        stop_reason = StopReason::Cancelled;
        stop_triggered = true;
    }

    let final_content = finalize_content(&content, stop_reason);
    if stop_reason != StopReason::Cancelled {
        state.transcript.push(
            ConversationMessage::assistant(final_content.clone())
                .with_tool_calls(detected.clone()),
        );
        state.transcript.extend(staged);
    }

    Ok(SubRoundOutcome {
        content: final_content,
        tool_calls: detected,
        stopped: stop_triggered,
        stop_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_truncates_at_close_marker_on_reasoning_stop() {
        let raw = "<think>let me see</think> leaked text after abort";
        let cut = finalize_content(raw, StopReason::ReasoningComplete);
        assert_eq!(cut, "<think>let me see</think>");
    }

    #[test]
    fn finalize_keeps_content_for_other_reasons() {
        let raw = "<think>a</think> tail";
        assert_eq!(finalize_content(raw, StopReason::NaturalEnd), raw);
        assert_eq!(finalize_content(raw, StopReason::ToolCall), raw);
    }

    #[test]
    fn finalize_without_marker_is_identity() {
        let raw = "no markers here";
        assert_eq!(finalize_content(raw, StopReason::ReasoningComplete), raw);
    }

    #[test]
    fn finalize_cuts_at_the_first_close_marker() {
        let raw = "<think>a</think>mid</think>tail";
        assert_eq!(
            finalize_content(raw, StopReason::ReasoningComplete),
            "<think>a</think>"
        );
    }
}
