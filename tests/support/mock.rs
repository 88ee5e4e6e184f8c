//! Scripted collaborators for end-to-end orchestration tests.
//!
//! The client replays pre-scripted rounds of stream fragments and records
//! every request it receives; registry and memory record their invocations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use convoke::cancel::{AbortHandle, CancellationToken};
use convoke::error::OrchestrationError;
use convoke::memory::MemoryStore;
use convoke::registry::{RequestContext, ToolRegistry};
use convoke::stream::{ModelStreamClient, ModelStreamHandle, StreamFragment};
use convoke::types::{
    ConversationMessage, ParameterKind, ToolDefinition, ToolParameter, ToolResult,
};

/// The scripted fragments one `stream_chat` call yields, in order.
pub type ScriptedRound = Vec<Result<StreamFragment, OrchestrationError>>;

/// One recorded `stream_chat` request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ConversationMessage>,
    pub tools_sent: bool,
}

/// Model client that replays scripted rounds and records every request.
///
/// Each `stream_chat` call consumes the next scripted round. The returned
/// stream honors its abort handle: once aborted it stops yielding, like a
/// closed network connection with nothing left in the buffer. An optional
/// gate makes the stream wait before every fragment after the first, so a
/// test can interleave actions (such as cancelling) deterministically.
pub struct ScriptedClient {
    rounds: Mutex<Vec<ScriptedRound>>,
    requests: Mutex<Vec<RecordedRequest>>,
    tool_support: bool,
    probe_error: bool,
    gate: Option<Arc<Notify>>,
}

impl ScriptedClient {
    pub fn new(rounds: Vec<ScriptedRound>) -> Self {
        Self {
            rounds: Mutex::new(rounds),
            requests: Mutex::new(Vec::new()),
            tool_support: true,
            probe_error: false,
            gate: None,
        }
    }

    /// Make the capability probe report no tool support.
    pub fn without_tool_support(mut self) -> Self {
        self.tool_support = false;
        self
    }

    /// Make the capability probe fail outright.
    pub fn with_probe_error(mut self) -> Self {
        self.probe_error = true;
        self
    }

    /// Gate every fragment after a round's first on a notification.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Requests observed so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelStreamClient for ScriptedClient {
    async fn stream_chat(
        &self,
        _model: &str,
        messages: Vec<ConversationMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ModelStreamHandle, OrchestrationError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages,
            tools_sent: tools.is_some(),
        });
        let round = {
            let mut rounds = self.rounds.lock().unwrap();
            if rounds.is_empty() {
                Vec::new()
            } else {
                rounds.remove(0)
            }
        };
        let abort = AbortHandle::new();
        let stream_abort = abort.clone();
        let gate = self.gate.clone();
        let stream = Box::pin(async_stream::stream! {
            for (i, item) in round.into_iter().enumerate() {
                if i > 0 {
                    if let Some(gate) = &gate {
                        gate.notified().await;
                    }
                }
                if stream_abort.is_aborted() {
                    return;
                }
                yield item;
            }
        });
        Ok(ModelStreamHandle { stream, abort })
    }

    async fn check_tool_support(&self, _model: &str) -> Result<bool, OrchestrationError> {
        if self.probe_error {
            return Err(OrchestrationError::stream("probe endpoint unreachable"));
        }
        Ok(self.tool_support)
    }
}

/// Registry serving canned results and recording every invocation.
pub struct RecordingRegistry {
    tools: Vec<ToolDefinition>,
    responses: HashMap<String, ToolResult>,
    failures: HashMap<String, String>,
    invocations: Mutex<Vec<(String, Value)>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            responses: HashMap::new(),
            failures: HashMap::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Register a tool that returns the given result on every invocation.
    pub fn with_tool(mut self, def: ToolDefinition, result: ToolResult) -> Self {
        self.responses.insert(def.name.clone(), result);
        self.tools.push(def);
        self
    }

    /// Register a tool whose invocations fail at the provider boundary.
    pub fn with_failing_tool(mut self, def: ToolDefinition, message: &str) -> Self {
        self.failures.insert(def.name.clone(), message.to_string());
        self.tools.push(def);
        self
    }

    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invocation_count(&self, name: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .count()
    }
}

#[async_trait]
impl ToolRegistry for RecordingRegistry {
    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        _context: &RequestContext,
        _token: &CancellationToken,
    ) -> Result<ToolResult, OrchestrationError> {
        self.invocations
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        if let Some(message) = self.failures.get(name) {
            return Err(OrchestrationError::tool(message));
        }
        Ok(self
            .responses
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolResult::text("ok")))
    }
}

/// Memory store with a fixed retrieval payload that records writes.
pub struct RecordingMemory {
    retrieval: String,
    stored: Mutex<Vec<(String, String)>>,
}

impl RecordingMemory {
    pub fn new() -> Self {
        Self {
            retrieval: String::new(),
            stored: Mutex::new(Vec::new()),
        }
    }

    pub fn with_retrieval(mut self, text: &str) -> Self {
        self.retrieval = text.to_string();
        self
    }

    pub fn stored(&self) -> Vec<(String, String)> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryStore for RecordingMemory {
    async fn retrieve(&self, _query: &str) -> Result<String, OrchestrationError> {
        Ok(self.retrieval.clone())
    }

    async fn store(&self, question: &str, response: &str) -> Result<(), OrchestrationError> {
        self.stored
            .lock()
            .unwrap()
            .push((question.to_string(), response.to_string()));
        Ok(())
    }
}

/// Weather lookup definition used across the tests.
pub fn weather_tool() -> ToolDefinition {
    ToolDefinition::with_parameters(
        "get_weather",
        "Look up current weather for a city",
        &[ToolParameter::new("city", ParameterKind::String, "City name").required()],
    )
}
