//! Conversation messages and roles.

use serde::{Deserialize, Serialize};

use super::tools::ToolCallRequest;

/// Role of a message in the running conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction
    System,
    /// User input
    User,
    /// Model response
    Assistant,
    /// Tool result fed back to the model
    Tool,
}

/// One turn in the running conversation sent to the model.
///
/// The ordered sequence of these messages (the transcript) is exclusively
/// owned by a single in-flight orchestration run. Rounds append, never rewrite
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Message role
    pub role: MessageRole,
    /// Text content
    pub content: String,
    /// Tool invocation requests attached to an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ConversationMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a tool-result message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, content)
    }

    /// Attach tool-call requests to this message (assistant messages only in
    /// practice; the role is not enforced here).
    pub fn with_tool_calls(mut self, calls: Vec<ToolCallRequest>) -> Self {
        self.tool_calls = if calls.is_empty() { None } else { Some(calls) };
        self
    }

    /// Whether this message carries at least one tool-call request.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_role() {
        assert_eq!(ConversationMessage::system("s").role, MessageRole::System);
        assert_eq!(ConversationMessage::user("u").role, MessageRole::User);
        assert_eq!(
            ConversationMessage::assistant("a").role,
            MessageRole::Assistant
        );
        assert_eq!(ConversationMessage::tool("t").role, MessageRole::Tool);
    }

    #[test]
    fn empty_tool_call_list_normalizes_to_none() {
        let msg = ConversationMessage::assistant("hi").with_tool_calls(vec![]);
        assert!(msg.tool_calls.is_none());
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ConversationMessage::tool("ok");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
    }
}
