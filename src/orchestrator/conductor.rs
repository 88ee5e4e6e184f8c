//! Phase-based "conductor" policy.
//!
//! A finite state machine over named phases. Each phase injects its
//! instruction into the transcript, runs one streaming sub-round with a
//! phase-specific stop condition, and returns the next phase; the state
//! machine is data, not duplicated control flow. Tool execution runs with
//! validation enabled and loops back to the decision phase through a
//! reflection instruction; the global transition cap bounds that loop.

use crate::error::OrchestrationError;
use crate::types::{ConversationMessage, ToolCallRequest};

use super::subround::{StopCondition, StopReason, run_sub_round};
use super::{Run, StepRecord};

const INITIAL_INSTRUCTION: &str = "Work through the user's request step by step inside \
<think> tags before doing anything else. Close the tag when your reasoning is complete.";

const DECISION_INSTRUCTION: &str = "Decide whether any of the available tools are needed to \
answer. Call the tools you need now, or answer the user directly if none are needed.";

const REFLECTION_INSTRUCTION: &str = "Review the tool results above. Decide whether further \
tool calls are needed, or answer the user using what you have learned.";

/// Conductor phases. `ToolExecution` carries the calls detected by the
/// decision phase.
#[derive(Debug, Clone, PartialEq)]
enum Phase {
    InitialProcessing,
    ToolDecision,
    ToolExecution(Vec<ToolCallRequest>),
    End,
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Self::InitialProcessing => "initial",
            Self::ToolDecision => "decision",
            Self::ToolExecution(_) => "execution",
            Self::End => "end",
        }
    }
}

impl Run {
    pub(crate) async fn conductor(&mut self) -> Result<(), OrchestrationError> {
        self.state.transcript = self.base_transcript();
        let executor = self.executor(true);
        let client = self.client.clone();
        let tools = self.input.tool_definitions.clone();

        let mut phase = Phase::InitialProcessing;
        let mut transitions = 0usize;

        while phase != Phase::End {
            transitions += 1;
            if transitions > self.options.max_rounds {
                return self.send_cap_notice().await;
            }
            if self.state.token.is_cancelled() {
                return Ok(());
            }
            tracing::debug!(transition = transitions, phase = phase.label(), "conductor phase");

            phase = match phase {
                Phase::InitialProcessing => {
                    self.state
                        .transcript
                        .push(ConversationMessage::system(INITIAL_INSTRUCTION));
                    let outcome = run_sub_round(
                        client.as_ref(),
                        &self.options.model,
                        &mut self.state,
                        Some(tools.clone()),
                        StopCondition::on_reasoning_complete(),
                        None,
                    )
                    .await?;
                    self.steps.push(StepRecord {
                        round: transitions,
                        label: "initial",
                        tool_calls: outcome.tool_calls.len(),
                        content_chars: outcome.content.chars().count(),
                    });
                    if outcome.stop_reason == StopReason::Cancelled {
                        Phase::End
                    } else if outcome.tool_calls.is_empty() {
                        Phase::ToolDecision
                    } else {
                        // Calls requested during the reasoning pass skip the
                        // decision detour.
                        Phase::ToolExecution(outcome.tool_calls)
                    }
                }

                Phase::ToolDecision => {
                    self.state
                        .transcript
                        .push(ConversationMessage::system(DECISION_INSTRUCTION));
                    let outcome = run_sub_round(
                        client.as_ref(),
                        &self.options.model,
                        &mut self.state,
                        Some(tools.clone()),
                        StopCondition::on_tool_call(),
                        None,
                    )
                    .await?;
                    self.steps.push(StepRecord {
                        round: transitions,
                        label: "decision",
                        tool_calls: outcome.tool_calls.len(),
                        content_chars: outcome.content.chars().count(),
                    });
                    if outcome.stop_reason == StopReason::Cancelled
                        || outcome.tool_calls.is_empty()
                    {
                        Phase::End
                    } else {
                        Phase::ToolExecution(outcome.tool_calls)
                    }
                }

                Phase::ToolExecution(calls) => {
                    let fresh: Vec<ToolCallRequest> = calls
                        .into_iter()
                        .filter(|c| self.state.executed.insert(c.identity_key()))
                        .collect();
                    if fresh.is_empty() {
                        // Everything the model asked for already ran; nothing
                        // new to reflect on.
                        Phase::End
                    } else {
                        let results = executor
                            .execute_all(
                                &fresh,
                                &mut self.state.transcript,
                                &self.state.context,
                                &self.state.token,
                                &self.state.out,
                            )
                            .await?;
                        self.steps.push(StepRecord {
                            round: transitions,
                            label: "execution",
                            tool_calls: results.len(),
                            content_chars: 0,
                        });
                        self.state
                            .transcript
                            .push(ConversationMessage::system(REFLECTION_INSTRUCTION));
                        Phase::ToolDecision
                    }
                }

                Phase::End => Phase::End,
            };
        }
        Ok(())
    }
}
