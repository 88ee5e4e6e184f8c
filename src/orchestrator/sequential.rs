//! Sequential inline tool-calling policy.
//!
//! A single capped loop. Each iteration streams one response with tool
//! definitions attached; calls are executed as they arrive mid-stream without
//! aborting the stream, their results land in the transcript, and the loop
//! re-asks until a round detects no calls.

use crate::error::OrchestrationError;

use super::subround::{StopCondition, StopReason, run_sub_round};
use super::{Run, StepRecord};

impl Run {
    pub(crate) async fn sequential(&mut self) -> Result<(), OrchestrationError> {
        self.state.transcript = self.base_transcript();
        let executor = self.executor(false);
        let client = self.client.clone();
        let tools = self.input.tool_definitions.clone();

        let mut round = 0usize;
        loop {
            round += 1;
            if round > self.options.max_rounds {
                return self.send_cap_notice().await;
            }
            if self.state.token.is_cancelled() {
                return Ok(());
            }

            let outcome = run_sub_round(
                client.as_ref(),
                &self.options.model,
                &mut self.state,
                Some(tools.clone()),
                StopCondition::none(),
                Some(&executor),
            )
            .await?;
            self.steps.push(StepRecord {
                round,
                label: "sequential",
                tool_calls: outcome.tool_calls.len(),
                content_chars: outcome.content.chars().count(),
            });
            tracing::debug!(
                round,
                tool_calls = outcome.tool_calls.len(),
                "sequential round finished"
            );

            if outcome.stop_reason == StopReason::Cancelled {
                return Ok(());
            }
            // Zero detected calls means the conversation is complete.
            if outcome.tool_calls.is_empty() {
                return Ok(());
            }
        }
    }
}
