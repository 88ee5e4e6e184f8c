//! # Convoke - Streaming Conversation Orchestration
//!
//! Convoke turns a single user question into a fully orchestrated,
//! multi-round conversation with a streaming language model: tool calls are
//! detected mid-stream and executed against a registry, reasoning segments
//! are bracketed with structured events, and the whole run can be cancelled
//! cooperatively at any point.
//!
#![deny(unsafe_code)]

//! ## Features
//!
//! - **Three policies**: plain chat, sequential inline tool calling, and a
//!   phase-based conductor with validation and reflection.
//! - **Structured output**: a run yields one ordered stream of
//!   [`OutputFragment`] values (text, thinking brackets, tool lifecycle),
//!   never interleaved out of order.
//! - **Cooperative cancellation**: one [`CancellationToken`] per run; cancel
//!   aborts the in-flight model stream and stops tool dispatch between calls.
//! - **Capability fallback**: models without tool support are probed up front
//!   and served plain chat instead of failing.
//! - **Backpressure**: fragments flow through a bounded channel; a slow
//!   consumer slows the run instead of growing memory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use convoke::prelude::*;
//!
//! # async fn run(client: Arc<dyn ModelStreamClient>, registry: Arc<dyn ToolRegistry>) {
//! let engine = QueryEngine::new(
//!     client,
//!     registry,
//!     OrchestratorOptions::new("qwen3:latest"),
//! );
//!
//! let mut handle = engine
//!     .query(QueryMode::Sequential, "You are helpful.", vec![], "What's the weather?", None)
//!     .await;
//!
//! while let Some(fragment) = handle.stream.next().await {
//!     if let Some(text) = fragment.as_text() {
//!         print!("{text}");
//!     }
//! }
//! # }
//! ```

pub mod cancel;
pub mod engine;
pub mod error;
pub mod executor;
pub mod memory;
pub mod orchestrator;
pub mod registry;
pub mod segmenter;
pub mod stream;
pub mod types;

pub use cancel::{AbortHandle, CancellationToken};
pub use engine::{QueryEngine, QueryMode};
pub use error::OrchestrationError;
pub use executor::{ApprovalHook, ToolApproval, ToolCallExecutor};
pub use memory::MemoryStore;
pub use orchestrator::{
    OrchestrationPolicy, Orchestrator, OrchestratorOptions, OutputStream, RunHandle, RunInput,
    RunSummary, StepRecord,
};
pub use registry::{RequestContext, ToolRegistry};
pub use segmenter::ThinkingSegmenter;
pub use stream::{ModelStream, ModelStreamClient, ModelStreamHandle, StreamFragment};
pub use types::{
    ConversationMessage, MessageRole, OutputFragment, ToolCallRequest, ToolCallResult,
    ToolCallStatus, ToolContent, ToolDefinition, ToolParameter, ToolResult,
};

/// Convenience imports for typical callers.
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::engine::{QueryEngine, QueryMode};
    pub use crate::error::OrchestrationError;
    pub use crate::memory::MemoryStore;
    pub use crate::orchestrator::{
        OrchestrationPolicy, Orchestrator, OrchestratorOptions, RunHandle, RunInput, RunSummary,
    };
    pub use crate::registry::{RequestContext, ToolRegistry};
    pub use crate::stream::{ModelStreamClient, ModelStreamHandle, StreamFragment};
    pub use crate::types::{
        ConversationMessage, MessageRole, OutputFragment, ToolCallRequest, ToolCallResult,
        ToolDefinition, ToolResult,
    };
}
