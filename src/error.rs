//! Error types for the orchestration engine.
//!
//! A single crate-level error enum keeps the fallible seams uniform: the model
//! stream client, the tool registry and the memory store all report through
//! [`OrchestrationError`]. Nothing in this crate lets one of these escape a
//! run as a panic or an unhandled error; the orchestrator converts fatal
//! failures into a terminal output fragment instead.

use thiserror::Error;

/// Errors produced by the orchestration engine and its collaborators.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The model stream failed for a reason other than a requested abort.
    #[error("Model stream error: {0}")]
    Stream(String),

    /// The configured model rejected the request because it cannot do
    /// tool/function calling. Recovered by falling back to plain chat.
    #[error("Model does not support tool calling: {0}")]
    ToolSupportMissing(String),

    /// A tool invocation failed inside the tool provider process.
    #[error("Tool error: {0}")]
    Tool(String),

    /// The long-term memory collaborator failed. Never fatal for a run.
    #[error("Memory store error: {0}")]
    Memory(String),

    /// The in-flight operation was aborted, either by the cancellation token
    /// or because the caller stopped consuming the output stream. Expected
    /// control flow, not logged as an error.
    #[error("Operation aborted")]
    Aborted,

    /// A precondition on the caller's input was violated.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Catch-all for bugs that should not happen.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestrationError {
    /// Create a stream error from anything displayable.
    pub fn stream(msg: impl std::fmt::Display) -> Self {
        Self::Stream(msg.to_string())
    }

    /// Create a tool error from anything displayable.
    pub fn tool(msg: impl std::fmt::Display) -> Self {
        Self::Tool(msg.to_string())
    }

    /// Whether this error means the model lacks tool support.
    ///
    /// The capability probe can be wrong or stale, so the orchestrator also
    /// inspects stream errors for the telltale wording providers use when a
    /// request with tools hits a model that cannot call them.
    pub fn indicates_missing_tool_support(&self) -> bool {
        match self {
            Self::ToolSupportMissing(_) => true,
            Self::Stream(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("does not support tools")
                    || msg.contains("does not support function")
                    || msg.contains("tool calling is not supported")
                    || msg.contains("no tool support")
            }
            _ => false,
        }
    }

    /// Whether this error is expected control flow (abort-induced) rather
    /// than a real failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_support_detected_from_error_content() {
        let err = OrchestrationError::Stream(
            "registry.ollama.ai: model 'tinyllama' does not support tools".to_string(),
        );
        assert!(err.indicates_missing_tool_support());

        let err = OrchestrationError::ToolSupportMissing("probe said no".to_string());
        assert!(err.indicates_missing_tool_support());

        let err = OrchestrationError::Stream("connection reset by peer".to_string());
        assert!(!err.indicates_missing_tool_support());
    }

    #[test]
    fn aborted_is_control_flow() {
        assert!(OrchestrationError::Aborted.is_aborted());
        assert!(!OrchestrationError::stream("boom").is_aborted());
    }
}
