//! Conversation orchestrator.
//!
//! Drives one or more rounds of model-stream consumption interleaved with
//! tool execution and yields a single ordered output stream of
//! [`OutputFragment`]s. Three policies share the same streaming sub-round
//! primitive and differ only in state-machine topology:
//!
//! - [`OrchestrationPolicy::PlainChat`] — one pass-through round, no tools.
//! - [`OrchestrationPolicy::SequentialInline`] — a capped loop that executes
//!   tool calls as they arrive mid-stream and re-asks with the grown
//!   transcript until a round produces no calls.
//! - [`OrchestrationPolicy::Conductor`] — a phase state machine
//!   (initial processing, tool decision, tool execution/reflection) with
//!   phase-specific instructions and stop conditions.
//!
//! Every run owns its transcript, segmenter state and dedup set; nothing is
//! shared across concurrent requests. No failure propagates across the run
//! boundary: fatal stream errors become a terminal notice fragment and the
//! stream ends.

mod conductor;
mod sequential;
mod subround;

pub use subround::{StopCondition, StopReason, SubRoundOutcome, finalize_content};

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

use crate::cancel::CancellationToken;
use crate::error::OrchestrationError;
use crate::executor::{ApprovalHook, ToolCallExecutor};
use crate::memory::{MemoryStore, store_detached};
use crate::registry::{RequestContext, ToolRegistry};
use crate::segmenter::ThinkingSegmenter;
use crate::stream::ModelStreamClient;
use crate::types::{ConversationMessage, OutputFragment};

/// Which state-machine topology a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationPolicy {
    /// Single pass-through chat round, no tool machinery
    PlainChat,
    /// Capped loop with inline tool execution during the stream
    SequentialInline,
    /// Phase-based state machine with validation and reflection
    Conductor,
}

/// Default hard cap on rounds/phase transitions.
pub const DEFAULT_MAX_ROUNDS: usize = 50;

/// Orchestrator configuration.
#[derive(Clone)]
pub struct OrchestratorOptions {
    /// Model identifier passed to the stream client
    pub model: String,
    /// Hard cap on rounds/phase transitions per run
    pub max_rounds: usize,
    /// Optional approval hook consulted before each tool invocation
    pub on_tool_approval: Option<ApprovalHook>,
}

impl OrchestratorOptions {
    /// Options for a model with the default round cap.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            on_tool_approval: None,
        }
    }

    /// Override the round cap. Zero is clamped to one.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Install a tool approval hook.
    pub fn with_tool_approval(mut self, hook: ApprovalHook) -> Self {
        self.on_tool_approval = Some(hook);
        self
    }
}

/// Inputs for one orchestration run.
#[derive(Debug, Clone)]
pub struct RunInput {
    /// System prompt, non-empty
    pub system_prompt: String,
    /// Tools available to this run; empty engages the pure pass-through path
    pub tool_definitions: Vec<crate::types::ToolDefinition>,
    /// Prior user/assistant turns
    pub history: Vec<ConversationMessage>,
    /// Retrieved long-term memory text; injected only when non-empty
    pub memories: String,
    /// The user's question
    pub question: String,
}

/// Record of one completed round or phase.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// 1-based round/transition number
    pub round: usize,
    /// Which part of the state machine produced it
    pub label: &'static str,
    /// Tool calls detected in this step
    pub tool_calls: usize,
    /// Characters of assistant content produced
    pub content_chars: usize,
}

/// Summary handed to the caller when a run finishes.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Per-round records in order
    pub steps: Vec<StepRecord>,
    /// Whether the run degraded to plain chat
    pub fell_back: bool,
    /// Whether the run observed a cancellation
    pub cancelled: bool,
    /// Whether the round cap terminated the run
    pub round_cap_hit: bool,
}

/// The single ordered output sequence of a run. Lazy, single-pass,
/// forward-only; dropping it stops further model and tool work.
pub type OutputStream = Pin<Box<dyn Stream<Item = OutputFragment> + Send>>;

/// A started run: its output stream, a summary receiver and the token that
/// cancels it.
pub struct RunHandle {
    /// Ordered fragments as they are produced
    pub stream: OutputStream,
    /// Resolves when the run ends
    pub summary: oneshot::Receiver<RunSummary>,
    /// Cancels the run from a concurrent task
    pub token: CancellationToken,
}

/// Per-run mutable state, exclusively owned by the driving task.
pub(crate) struct RunState {
    pub transcript: Vec<ConversationMessage>,
    pub segmenter: ThinkingSegmenter,
    pub executed: HashSet<String>,
    pub out: mpsc::Sender<OutputFragment>,
    pub token: CancellationToken,
    pub context: RequestContext,
}

impl RunState {
    /// Forward one fragment; a dropped receiver surfaces as `Aborted` so the
    /// run unwinds instead of doing work nobody will observe.
    pub async fn send(&self, fragment: OutputFragment) -> Result<(), OrchestrationError> {
        self.out
            .send(fragment)
            .await
            .map_err(|_| OrchestrationError::Aborted)
    }
}

/// The conversation orchestrator. All mutable state lives in the runs it
/// spawns; one orchestrator serves any number of concurrent requests.
pub struct Orchestrator {
    client: Arc<dyn ModelStreamClient>,
    registry: Arc<dyn ToolRegistry>,
    memory: Option<Arc<dyn MemoryStore>>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Create an orchestrator over a model client and tool registry.
    pub fn new(
        client: Arc<dyn ModelStreamClient>,
        registry: Arc<dyn ToolRegistry>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            client,
            registry,
            memory: None,
            options,
        }
    }

    /// Attach a long-term memory store.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Start a run and return its output stream.
    ///
    /// The run executes on a spawned task and communicates through a bounded
    /// channel, so a caller that stops consuming exerts backpressure and a
    /// caller that drops the stream stops the run. If `token` is `None` the
    /// process-wide default token is used.
    pub fn run(
        &self,
        policy: OrchestrationPolicy,
        input: RunInput,
        token: Option<CancellationToken>,
    ) -> RunHandle {
        let token = token.unwrap_or_else(crate::cancel::default_token);
        let (out, mut rx) = mpsc::channel::<OutputFragment>(64);
        let (summary_tx, summary_rx) = oneshot::channel();

        let run = Run {
            client: self.client.clone(),
            registry: self.registry.clone(),
            memory: self.memory.clone(),
            options: self.options.clone(),
            state: RunState {
                transcript: Vec::new(),
                segmenter: ThinkingSegmenter::new(),
                executed: HashSet::new(),
                out,
                token: token.clone(),
                context: RequestContext::new(self.options.model.clone()),
            },
            input,
            steps: Vec::new(),
            fell_back: false,
            round_cap_hit: false,
        };

        tokio::spawn(async move {
            let summary = run.drive(policy).await;
            let _ = summary_tx.send(summary);
        });

        let stream = Box::pin(async_stream::stream! {
            while let Some(fragment) = rx.recv().await {
                yield fragment;
            }
        });

        RunHandle {
            stream,
            summary: summary_rx,
            token,
        }
    }
}

/// One in-flight run, owned by its driving task.
pub(crate) struct Run {
    pub client: Arc<dyn ModelStreamClient>,
    pub registry: Arc<dyn ToolRegistry>,
    pub memory: Option<Arc<dyn MemoryStore>>,
    pub options: OrchestratorOptions,
    pub state: RunState,
    pub input: RunInput,
    pub steps: Vec<StepRecord>,
    pub fell_back: bool,
    pub round_cap_hit: bool,
}

impl Run {
    async fn drive(mut self, policy: OrchestrationPolicy) -> RunSummary {
        let request_id = self.state.context.request_id.clone();
        tracing::debug!(request_id = %request_id, ?policy, "orchestration run starting");

        let result = self.dispatch(policy).await;

        // No run reports an open reasoning segment as part of final state.
        if let Some(event) = self.state.segmenter.force_close() {
            let _ = self.state.send(event).await;
        }

        match result {
            Ok(()) => {}
            Err(e) if e.is_aborted() => {
                tracing::debug!(request_id = %request_id, "run aborted");
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, "run ended with stream error: {e}");
                let _ = self
                    .state
                    .send(OutputFragment::Notice {
                        text: format!("The response could not be completed: {e}"),
                    })
                    .await;
            }
        }

        RunSummary {
            steps: self.steps,
            fell_back: self.fell_back,
            cancelled: self.state.token.is_cancelled(),
            round_cap_hit: self.round_cap_hit,
        }
    }

    async fn dispatch(&mut self, policy: OrchestrationPolicy) -> Result<(), OrchestrationError> {
        match policy {
            OrchestrationPolicy::PlainChat => self.plain_chat().await,
            OrchestrationPolicy::SequentialInline | OrchestrationPolicy::Conductor => {
                if !self.probe_tool_support().await {
                    // Fallback, not an error: the user still gets an answer.
                    self.fell_back = !self.input.tool_definitions.is_empty();
                    return self.plain_chat().await;
                }
                let result = match policy {
                    OrchestrationPolicy::SequentialInline => self.sequential().await,
                    _ => self.conductor().await,
                };
                match result {
                    Err(e) if e.indicates_missing_tool_support() => {
                        // The probe was wrong or stale; degrade for the
                        // remainder of this request with a fresh transcript.
                        tracing::warn!(
                            "model rejected tools mid-run, falling back to plain chat: {e}"
                        );
                        self.fell_back = true;
                        self.state.transcript.clear();
                        self.state.segmenter = ThinkingSegmenter::new();
                        self.plain_chat().await
                    }
                    other => other,
                }
            }
        }
    }

    /// Capability probe. An empty tool list skips the probe entirely; probe
    /// failures degrade rather than erroring.
    async fn probe_tool_support(&self) -> bool {
        if self.input.tool_definitions.is_empty() {
            return false;
        }
        match self.client.check_tool_support(&self.options.model).await {
            Ok(supported) => supported,
            Err(e) => {
                tracing::warn!("tool support probe failed, assuming unsupported: {e}");
                false
            }
        }
    }

    /// Plain single-round chat: no tool definitions are sent to the model.
    /// Used directly and as the capability fallback target.
    async fn plain_chat(&mut self) -> Result<(), OrchestrationError> {
        self.state.transcript = self.base_transcript();
        let client = self.client.clone();
        let outcome = subround::run_sub_round(
            client.as_ref(),
            &self.options.model,
            &mut self.state,
            None,
            StopCondition::none(),
            None,
        )
        .await?;
        self.steps.push(StepRecord {
            round: 1,
            label: "chat",
            tool_calls: 0,
            content_chars: outcome.content.chars().count(),
        });

        if outcome.stop_reason != StopReason::Cancelled {
            if let Some(memory) = &self.memory {
                store_detached(
                    memory.clone(),
                    self.input.question.clone(),
                    outcome.content.clone(),
                );
            }
        }
        Ok(())
    }

    /// Initial transcript shared by every policy: system prompt, prior
    /// history, the synthetic memory message when non-empty, then the
    /// question.
    fn base_transcript(&self) -> Vec<ConversationMessage> {
        let mut messages = vec![ConversationMessage::system(&self.input.system_prompt)];
        messages.extend(self.input.history.iter().cloned());
        if !self.input.memories.is_empty() {
            messages.push(ConversationMessage::tool(format!(
                "Relevant memories from previous conversations:\n{}",
                self.input.memories
            )));
        }
        messages.push(ConversationMessage::user(&self.input.question));
        messages
    }

    /// Executor over the registry snapshot, configured per policy.
    pub(crate) fn executor(&self, validate: bool) -> ToolCallExecutor {
        let mut executor =
            ToolCallExecutor::new(self.registry.clone(), self.input.tool_definitions.clone())
                .with_validation(validate);
        if let Some(hook) = &self.options.on_tool_approval {
            executor = executor.with_approval(hook.clone());
        }
        executor
    }

    /// Terminal note for the round-cap safety valve. Designed termination,
    /// not an error.
    pub(crate) async fn send_cap_notice(&mut self) -> Result<(), OrchestrationError> {
        self.round_cap_hit = true;
        tracing::debug!(max_rounds = self.options.max_rounds, "round cap reached");
        self.state
            .send(OutputFragment::Notice {
                text: format!(
                    "Stopped after reaching the limit of {} rounds for this request.",
                    self.options.max_rounds
                ),
            })
            .await
    }
}
