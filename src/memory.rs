//! Long-term memory interface.
//!
//! The embedding/retrieval subsystem is a black box behind this trait. The
//! orchestrator only retrieves a free-text block before a run and stores the
//! finished exchange afterwards; the store is detached from the critical path.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OrchestrationError;

/// Black-box retrieve/store service for long-term memories.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Retrieve memory text relevant to `query`. Empty string means nothing
    /// relevant was found.
    async fn retrieve(&self, query: &str) -> Result<String, OrchestrationError>;

    /// Persist one completed (question, response) exchange.
    async fn store(&self, question: &str, response: &str) -> Result<(), OrchestrationError>;
}

/// Fire-and-forget memory write.
///
/// Detached from the run: failures are logged and never surface to the
/// caller, and nothing on the critical path awaits the write.
pub fn store_detached(store: Arc<dyn MemoryStore>, question: String, response: String) {
    tokio::spawn(async move {
        if let Err(e) = store.store(&question, &response).await {
            tracing::warn!("memory store write failed: {e}");
        }
    });
}
