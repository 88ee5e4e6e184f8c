//! Cooperative cancellation primitives.
//!
//! Cancellation is cooperative and best-effort-prompt: requesting it flips an
//! atomic flag and fires the abort handle of whatever operation is currently
//! attached, but the consuming loop may still observe a handful of in-flight
//! fragments before the abort takes effect.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

/// A handle that aborts one in-flight model stream.
///
/// Model stream clients hand one of these back per stream. Cloning shares the
/// underlying flag, so any clone can request the abort.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Create a fresh, un-aborted handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the underlying operation to terminate. Streams observing this
    /// handle stop producing as soon as possible; already-buffered fragments
    /// may still be delivered.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether an abort was requested.
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Cooperative cancellation token shared across one request's lifetime.
///
/// The caller keeps a clone and may call [`cancel`](Self::cancel) from a
/// concurrent task (typically a UI interaction handler) while the orchestrator
/// consults [`is_cancelled`](Self::is_cancelled) at every suspension point.
/// Each round attaches the current stream's [`AbortHandle`] so that a cancel
/// request propagates to the in-flight network call.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
    abort: Mutex<Option<AbortHandle>>,
}

impl CancellationToken {
    /// Create a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation, recording a reason and firing the attached abort
    /// handle if any. Idempotent beyond overwriting the reason.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        *self.inner.reason.lock().unwrap() = Some(reason.into());
        if let Some(abort) = self.inner.abort.lock().unwrap().as_ref() {
            abort.abort();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The reason passed to the most recent [`cancel`](Self::cancel) call.
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().unwrap().clone()
    }

    /// Associate the current in-flight operation's abort handle, replacing any
    /// prior one. If the token is already cancelled the handle is fired
    /// immediately so a late-attaching stream cannot outlive the cancel.
    pub fn attach(&self, abort: AbortHandle) {
        if self.is_cancelled() {
            abort.abort();
        }
        *self.inner.abort.lock().unwrap() = Some(abort);
    }

    /// Drop the attached abort handle, if any.
    pub fn detach(&self) {
        *self.inner.abort.lock().unwrap() = None;
    }

    /// Clear the cancelled flag, reason and attached handle.
    ///
    /// Must only be called between independent requests. Resetting a token
    /// that is still backing an active stream is racy; prefer one token per
    /// request and let the old one drop.
    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
        *self.inner.reason.lock().unwrap() = None;
        *self.inner.abort.lock().unwrap() = None;
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_TOKEN: CancellationToken = CancellationToken::new();
}

/// The process-wide token used when a caller supplies none.
///
/// Provided for callers that drive a single conversation at a time; anything
/// running concurrent requests should create one token per request instead.
pub fn default_token() -> CancellationToken {
    DEFAULT_TOKEN.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_sets_flag_and_reason() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel("user pressed stop");
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("user pressed stop"));
    }

    #[test]
    fn cancel_is_idempotent_beyond_reason() {
        let token = CancellationToken::new();
        token.cancel("first");
        token.cancel("second");
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("second"));
    }

    #[test]
    fn cancel_fires_attached_abort() {
        let token = CancellationToken::new();
        let abort = AbortHandle::new();
        token.attach(abort.clone());
        assert!(!abort.is_aborted());
        token.cancel("stop");
        assert!(abort.is_aborted());
    }

    #[test]
    fn attach_after_cancel_fires_immediately() {
        let token = CancellationToken::new();
        token.cancel("stop");
        let abort = AbortHandle::new();
        token.attach(abort.clone());
        assert!(abort.is_aborted());
    }

    #[test]
    fn attach_replaces_prior_handle() {
        let token = CancellationToken::new();
        let first = AbortHandle::new();
        let second = AbortHandle::new();
        token.attach(first.clone());
        token.attach(second.clone());
        token.cancel("stop");
        assert!(!first.is_aborted());
        assert!(second.is_aborted());
    }

    #[test]
    fn reset_clears_everything() {
        let token = CancellationToken::new();
        token.attach(AbortHandle::new());
        token.cancel("stop");
        token.reset();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let view = token.clone();
        token.cancel("stop");
        assert!(view.is_cancelled());
    }
}
