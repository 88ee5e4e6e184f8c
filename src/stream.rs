//! Model stream client interface.
//!
//! The language-model runtime is an external collaborator. This module defines
//! the streaming contract the orchestrator consumes: an async sequence of
//! [`StreamFragment`]s with a request-scoped [`AbortHandle`], plus a
//! best-effort capability probe for tool support.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::cancel::AbortHandle;
use crate::error::OrchestrationError;
use crate::types::{ConversationMessage, ToolCallRequest, ToolDefinition};

/// One incremental piece of a streamed model response: a text delta and/or
/// embedded tool-call requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFragment {
    /// Incremental text, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_delta: Option<String>,
    /// Tool-call requests emitted with this fragment, in stream order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl StreamFragment {
    /// A text-only fragment.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            text_delta: Some(delta.into()),
            tool_calls: None,
        }
    }

    /// A fragment carrying tool-call requests.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text_delta: None,
            tool_calls: Some(calls),
        }
    }
}

/// Incremental model response stream.
pub type ModelStream =
    Pin<Box<dyn Stream<Item = Result<StreamFragment, OrchestrationError>> + Send>>;

/// A model stream together with its abort capability.
pub struct ModelStreamHandle {
    /// The fragment stream
    pub stream: ModelStream,
    /// Aborts the underlying request; already-buffered fragments may still
    /// arrive after the abort is requested
    pub abort: AbortHandle,
}

impl ModelStreamHandle {
    /// Wrap a stream with a fresh abort handle.
    pub fn new(stream: ModelStream) -> Self {
        Self {
            stream,
            abort: AbortHandle::new(),
        }
    }
}

/// Client for a streaming language-model runtime.
#[async_trait]
pub trait ModelStreamClient: Send + Sync {
    /// Open a streaming chat completion.
    ///
    /// `tools` being `None` means no tool definitions are sent at all, which
    /// is how the plain-chat path and the capability fallback behave.
    async fn stream_chat(
        &self,
        model: &str,
        messages: Vec<ConversationMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ModelStreamHandle, OrchestrationError>;

    /// Probe whether `model` supports tool/function calling.
    ///
    /// Best-effort and possibly stale; the orchestrator treats a wrong answer
    /// as recoverable by also inspecting stream errors.
    async fn check_tool_support(&self, model: &str) -> Result<bool, OrchestrationError>;
}
