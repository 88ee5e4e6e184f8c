//! Tool registry interface.
//!
//! Tools are capabilities exposed by separate tool-provider processes. The
//! registry collaborator supplies a snapshot of definitions at run start and
//! executes invocations; tools connecting or disconnecting mid-run do not
//! change an in-flight run's view.

use async_trait::async_trait;
use serde_json::Value;

use crate::cancel::CancellationToken;
use crate::error::OrchestrationError;
use crate::types::{ToolDefinition, ToolResult};

/// Per-request context threaded into tool invocations.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Identifies the logical user-visible request
    pub request_id: String,
    /// Model the request runs against
    pub model: String,
}

impl RequestContext {
    /// Create a context with a fresh request id.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            model: model.into(),
        }
    }
}

/// Registry of invocable tools.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Snapshot of the currently available tool definitions.
    fn list_tools(&self) -> Vec<ToolDefinition>;

    /// Invoke a tool by name.
    ///
    /// Implementations should surface provider failures as `Err`; the
    /// executor converts those into error results rather than letting them
    /// end the run.
    async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        context: &RequestContext,
        token: &CancellationToken,
    ) -> Result<ToolResult, OrchestrationError>;
}
