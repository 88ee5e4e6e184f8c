//! Query engine: thin dispatch over the orchestration policies.
//!
//! Selects a policy from the requested mode, wires in memory retrieval and
//! the registry snapshot, and hands the run back to the caller. Everything
//! interesting happens in [`crate::orchestrator`].

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::memory::MemoryStore;
use crate::orchestrator::{
    OrchestrationPolicy, Orchestrator, OrchestratorOptions, RunHandle, RunInput,
};
use crate::registry::ToolRegistry;
use crate::stream::ModelStreamClient;
use crate::types::ConversationMessage;

/// Requested interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Plain chat, no tools engaged
    Simple,
    /// Inline tool calling in a sequential loop
    Sequential,
    /// Phase-based conductor with validation and reflection
    Conductor,
}

impl QueryMode {
    fn policy(self) -> OrchestrationPolicy {
        match self {
            Self::Simple => OrchestrationPolicy::PlainChat,
            Self::Sequential => OrchestrationPolicy::SequentialInline,
            Self::Conductor => OrchestrationPolicy::Conductor,
        }
    }
}

/// Front door for callers: owns the collaborators and starts runs.
pub struct QueryEngine {
    orchestrator: Orchestrator,
    registry: Arc<dyn ToolRegistry>,
    memory: Option<Arc<dyn MemoryStore>>,
}

impl QueryEngine {
    /// Create an engine over a model client and tool registry.
    pub fn new(
        client: Arc<dyn ModelStreamClient>,
        registry: Arc<dyn ToolRegistry>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(client.clone(), registry.clone(), options),
            registry,
            memory: None,
        }
    }

    /// Attach a long-term memory store, used both for retrieval before a run
    /// and the fire-and-forget write after plain-chat completion.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.orchestrator = self.orchestrator.with_memory(memory.clone());
        self.memory = Some(memory);
        self
    }

    /// Start one query.
    ///
    /// Memory retrieval is best effort: a failing store logs a warning and
    /// the run proceeds without memories. The registry snapshot is taken
    /// here, once, for the whole run.
    pub async fn query(
        &self,
        mode: QueryMode,
        system_prompt: impl Into<String>,
        history: Vec<ConversationMessage>,
        question: impl Into<String>,
        token: Option<CancellationToken>,
    ) -> RunHandle {
        let question = question.into();
        let memories = match &self.memory {
            Some(memory) => match memory.retrieve(&question).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("memory retrieval failed, continuing without: {e}");
                    String::new()
                }
            },
            None => String::new(),
        };
        let tool_definitions = match mode {
            QueryMode::Simple => Vec::new(),
            _ => self.registry.list_tools(),
        };
        let input = RunInput {
            system_prompt: system_prompt.into(),
            tool_definitions,
            history,
            memories,
            question,
        };
        self.orchestrator.run(mode.policy(), input, token)
    }
}
