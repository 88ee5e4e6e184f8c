//! Tool call executor.
//!
//! Given detected tool-call requests, validates arguments, invokes the
//! matching tool from the run's registry snapshot, normalizes the result and
//! folds it back into the transcript, emitting lifecycle fragments for UI
//! consumption along the way. A failing tool never ends the run: every
//! failure mode becomes an error [`ToolCallResult`] the model can read and
//! react to on the next round.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::error::OrchestrationError;
use crate::registry::{RequestContext, ToolRegistry};
use crate::types::{
    ConversationMessage, OutputFragment, ToolCallRequest, ToolCallResult, ToolCallStatus,
    ToolContent, ToolDefinition, ToolResult,
};

/// Placeholder for tools that return no content. The model needs something to
/// read downstream, so this is never an empty string.
pub const EMPTY_RESULT_PLACEHOLDER: &str = "Tool executed successfully with no content.";

/// String argument values longer than this are flagged during validation.
const SUSPICIOUS_ARG_LEN: usize = 10_000;

/// Decision returned by a tool approval hook.
#[derive(Debug, Clone)]
pub enum ToolApproval {
    /// Run the call with the given arguments (typically the original ones).
    Approve(Value),
    /// Run the call with modified arguments.
    Modify(Value),
    /// Refuse the call; the reason is fed back to the model as an error result.
    Deny {
        /// Why the call was refused
        reason: String,
    },
}

/// Hook consulted before each tool invocation.
pub type ApprovalHook = Arc<dyn Fn(&str, &Value) -> ToolApproval + Send + Sync>;

/// Executes batches of tool calls sequentially.
///
/// Holds the registry snapshot captured at run start; tools appearing or
/// disappearing mid-run do not change this executor's view.
pub struct ToolCallExecutor {
    registry: Arc<dyn ToolRegistry>,
    tools: Vec<ToolDefinition>,
    validate: bool,
    on_approval: Option<ApprovalHook>,
}

impl ToolCallExecutor {
    /// Create an executor over a registry and its definition snapshot.
    pub fn new(registry: Arc<dyn ToolRegistry>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            registry,
            tools,
            validate: false,
            on_approval: None,
        }
    }

    /// Enable argument validation before invocation (conductor policy).
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Install an approval hook consulted before each invocation.
    pub fn with_approval(mut self, hook: ApprovalHook) -> Self {
        self.on_approval = Some(hook);
        self
    }

    /// Execute a batch of calls sequentially.
    ///
    /// Emits position, status and completion fragments through `out`, and
    /// appends one tool-role message per call to `transcript`. Cancellation is
    /// checked before each call; once the token is cancelled no further
    /// invocation starts. `Err(Aborted)` means the caller's output stream was
    /// dropped and the run should unwind.
    pub async fn execute_all(
        &self,
        calls: &[ToolCallRequest],
        transcript: &mut Vec<ConversationMessage>,
        context: &RequestContext,
        token: &CancellationToken,
        out: &mpsc::Sender<OutputFragment>,
    ) -> Result<Vec<ToolCallResult>, OrchestrationError> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if token.is_cancelled() {
                tracing::debug!(tool = %call.name, "skipping tool call after cancellation");
                break;
            }
            let call_id = Uuid::new_v4();
            send(
                out,
                OutputFragment::ToolCallPosition {
                    call_id,
                    tool_name: call.name.clone(),
                },
            )
            .await?;
            send(
                out,
                OutputFragment::ToolCallUpdate {
                    call_id,
                    tool_name: call.name.clone(),
                    status: ToolCallStatus::Executing,
                },
            )
            .await?;

            let result = self.execute_one(call, context, token).await;
            if result.is_error {
                tracing::warn!(tool = %call.name, "tool call failed: {}", result.content);
            } else {
                tracing::debug!(tool = %call.name, duration_ms = result.duration_ms, "tool call finished");
            }

            transcript.push(ConversationMessage::tool(tool_message_text(
                &call.name,
                &result.content,
            )));

            send(
                out,
                OutputFragment::ToolCallUpdate {
                    call_id,
                    tool_name: call.name.clone(),
                    status: ToolCallStatus::Completed {
                        duration_ms: result.duration_ms,
                        is_error: result.is_error,
                    },
                },
            )
            .await?;
            send(
                out,
                OutputFragment::ToolCallComplete {
                    call_id,
                    result: result.clone(),
                },
            )
            .await?;
            results.push(result);
        }
        Ok(results)
    }

    async fn execute_one(
        &self,
        call: &ToolCallRequest,
        context: &RequestContext,
        token: &CancellationToken,
    ) -> ToolCallResult {
        let started = Instant::now();
        let arguments_text = call.arguments.to_string();
        let definition = self.tools.iter().find(|t| t.name == call.name);

        if self.validate {
            if let Some(def) = definition {
                if let Err(reason) = validate_arguments(def, &call.arguments) {
                    return ToolCallResult {
                        tool_name: call.name.clone(),
                        arguments_text,
                        content: format!("Invalid arguments for tool '{}': {reason}", call.name),
                        is_error: true,
                        duration_ms: elapsed_ms(started),
                        analysis: Some(reason),
                    };
                }
            }
        }

        let mut arguments = call.arguments.clone();
        if let Some(hook) = &self.on_approval {
            match hook(&call.name, &arguments) {
                ToolApproval::Approve(args) | ToolApproval::Modify(args) => arguments = args,
                ToolApproval::Deny { reason } => {
                    return ToolCallResult {
                        tool_name: call.name.clone(),
                        arguments_text,
                        content: format!("Tool call denied: {reason}"),
                        is_error: true,
                        duration_ms: elapsed_ms(started),
                        analysis: Some(reason),
                    };
                }
            }
        }

        if definition.is_none() {
            return ToolCallResult {
                tool_name: call.name.clone(),
                arguments_text,
                content: format!("Tool '{}' not found", call.name),
                is_error: true,
                duration_ms: elapsed_ms(started),
                analysis: None,
            };
        }

        match self
            .registry
            .invoke(&call.name, arguments, context, token)
            .await
        {
            Ok(result) => ToolCallResult {
                tool_name: call.name.clone(),
                arguments_text,
                content: normalize_result(&result),
                is_error: result.is_error,
                duration_ms: elapsed_ms(started),
                analysis: None,
            },
            Err(e) => ToolCallResult {
                tool_name: call.name.clone(),
                arguments_text,
                content: format!("Tool execution failed: {e}"),
                is_error: true,
                duration_ms: elapsed_ms(started),
                analysis: None,
            },
        }
    }
}

async fn send(
    out: &mpsc::Sender<OutputFragment>,
    fragment: OutputFragment,
) -> Result<(), OrchestrationError> {
    out.send(fragment)
        .await
        .map_err(|_| OrchestrationError::Aborted)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Fold a tool result into the text the model reads on the next round.
/// The exact wording is presentation only; nothing parses it back.
fn tool_message_text(name: &str, content: &str) -> String {
    format!("Result from tool '{name}':\n{content}")
}

/// Concatenate text items and serialize everything else to a placeholder.
/// Empty results become [`EMPTY_RESULT_PLACEHOLDER`].
fn normalize_result(result: &ToolResult) -> String {
    let mut parts = Vec::new();
    for item in &result.content {
        match item {
            ToolContent::Text { text } => {
                if !text.is_empty() {
                    parts.push(text.clone());
                }
            }
            ToolContent::Other { kind, data } => {
                parts.push(format!("[{kind}] {data}"));
            }
        }
    }
    if parts.is_empty() {
        EMPTY_RESULT_PLACEHOLDER.to_string()
    } else {
        parts.join("\n")
    }
}

/// Check required parameters, obviously bad values, then the declared schema.
///
/// Returns actionable feedback meant for the model, so it can self-correct on
/// the next round.
fn validate_arguments(def: &ToolDefinition, arguments: &Value) -> Result<(), String> {
    let empty = serde_json::Map::new();
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(format!(
                "expected an object of named parameters, got {other}"
            ));
        }
    };

    let missing: Vec<&str> = def
        .required_parameters()
        .into_iter()
        .filter(|name| match args.get(*name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect();
    if !missing.is_empty() {
        return Err(format!(
            "missing required parameters: {}. Supply non-empty values for each.",
            missing.join(", ")
        ));
    }

    for (name, value) in args {
        if let Value::String(s) = value {
            if s.len() > SUSPICIOUS_ARG_LEN {
                return Err(format!(
                    "parameter '{name}' is suspiciously long ({} chars); pass a shorter value",
                    s.len()
                ));
            }
        }
    }

    validate_with_schema(&def.parameters, arguments)
}

fn validate_with_schema(schema: &Value, instance: &Value) -> Result<(), String> {
    if !schema.is_object() {
        return Ok(());
    }
    match jsonschema::validator_for(schema) {
        Ok(compiled) => {
            let msgs: Vec<String> = compiled
                .iter_errors(instance)
                .take(3)
                .map(|err| format!("{} at {}", err, err.instance_path))
                .collect();
            if msgs.is_empty() {
                Ok(())
            } else {
                Err(format!("arguments failed schema validation: {}", msgs.join("; ")))
            }
        }
        Err(e) => {
            tracing::warn!("invalid tool schema: {}", e);
            Ok(())
        }
    }
}
