//! Core data types for conversation orchestration.

mod events;
mod message;
mod tools;

pub use events::{OutputFragment, ToolCallStatus};
pub use message::{ConversationMessage, MessageRole};
pub use tools::{
    ParameterKind, ToolCallRequest, ToolCallResult, ToolContent, ToolDefinition, ToolParameter,
    ToolResult,
};
