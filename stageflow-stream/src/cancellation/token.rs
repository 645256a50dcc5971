//! Cancellation token for cooperative cancellation.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::warn;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn FnOnce(&str) + Send>;

struct TokenState {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation, keyed by registration id.
    callbacks: Mutex<Vec<(u64, CancelCallback)>>,
    next_id: AtomicU64,
    /// Wakes tasks awaiting [`CancellationToken::cancelled`].
    signal: watch::Sender<bool>,
    /// The parent's callback that forwards cancellation to this token.
    parent: Option<ParentLink>,
}

struct ParentLink {
    state: Arc<TokenState>,
    id: u64,
}

impl Drop for TokenState {
    fn drop(&mut self) {
        // A child that nobody holds any more must not stay registered on a
        // long-lived parent.
        if let Some(link) = self.parent.take() {
            link.state.callbacks.lock().retain(|(id, _)| *id != link.id);
        }
    }
}

/// A single-shot, broadcast cancellation signal.
///
/// Cloning is cheap and every clone observes the same signal. Cancellation
/// is idempotent and cannot be undone: only the first reason is kept.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates a new, pending cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<ParentLink>) -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            inner: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                reason: RwLock::new(None),
                callbacks: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                signal,
                parent,
            }),
        }
    }

    /// Requests cancellation with a reason.
    ///
    /// Only the first call has any effect. Callbacks are invoked on the
    /// calling thread; panics in callbacks are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        let state = &self.inner;
        // Held until the reason is set, so `on_cancel` never sees a
        // cancelled token without its reason.
        let mut pending = state.callbacks.lock();
        if state
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let reason = reason.into();
        *state.reason.write() = Some(reason.clone());
        let callbacks = std::mem::take(&mut *pending);
        drop(pending);
        state.signal.send_replace(true);

        for (_, callback) in callbacks {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Cancellation callback panicked: {:?}", e);
            }
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.register(id, callback);
    }

    fn register<F>(&self, id: u64, callback: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let mut callbacks = self.inner.callbacks.lock();
        if self.is_cancelled() {
            drop(callbacks);
            let reason = self.reason().unwrap_or_default();
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Cancellation callback panicked: {:?}", e);
            }
        } else {
            callbacks.push((id, Box::new(callback)));
        }
    }

    /// Number of callbacks waiting for the signal.
    #[cfg(test)]
    pub(crate) fn pending_callbacks(&self) -> usize {
        self.inner.callbacks.lock().len()
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }

    /// Completes once cancellation has been requested.
    ///
    /// Resolves immediately when the token is already cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.signal.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Creates a token that is cancelled whenever this one is.
    ///
    /// Cancelling the child leaves the parent untouched. Once every clone
    /// of the child is dropped, its registration on the parent is removed.
    #[must_use]
    pub fn child(&self) -> Self {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let child = Self::with_parent(Some(ParentLink {
            state: Arc::clone(&self.inner),
            id,
        }));
        let weak: Weak<TokenState> = Arc::downgrade(&child.inner);
        self.register(id, move |reason| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.cancel(reason);
            }
        });
        child
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_token_cancel() {
        let token = CancellationToken::new();
        token.cancel("User requested");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("User requested".to_string()));
    }

    #[test]
    fn test_token_cancel_idempotent() {
        let token = CancellationToken::new();
        token.cancel("First reason");
        token.cancel("Second reason");

        // First reason wins
        assert_eq!(token.reason(), Some("First reason".to_string()));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        token.cancel("shared");

        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_on_cancel_runs_once() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        token.on_cancel(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        token.cancel("test");
        token.cancel("again");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_cancel_after_cancellation() {
        let token = CancellationToken::new();
        token.cancel("late");

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        token.on_cancel(move |reason| {
            *seen_clone.lock() = Some(reason.to_string());
        });

        assert_eq!(seen.lock().as_deref(), Some("late"));
    }

    #[test]
    fn test_callback_panic_suppressed() {
        let token = CancellationToken::new();
        token.on_cancel(|_| panic!("Intentional panic"));

        token.cancel("test");
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancelled_future_wakes() {
        let token = CancellationToken::new();
        let mut waiter = task::spawn(token.cancelled());
        assert_pending!(waiter.poll());

        token.cancel("wake up");
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_cancelled_future_ready_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel("before");

        let mut waiter = task::spawn(token.cancelled());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancellationToken::new();
        let child = parent.child();

        parent.cancel("parent stop");
        assert!(child.is_cancelled());
        assert_eq!(child.reason(), Some("parent stop".to_string()));
    }

    #[test]
    fn test_child_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let child = parent.child();

        child.cancel("child stop");
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_dropped_children_unregister_from_parent() {
        let parent = CancellationToken::new();
        for _ in 0..10_000 {
            drop(parent.child());
        }
        assert_eq!(parent.pending_callbacks(), 0);

        let live = parent.child();
        let clone = live.clone();
        drop(live);
        assert_eq!(parent.pending_callbacks(), 1);

        drop(clone);
        assert_eq!(parent.pending_callbacks(), 0);
    }

    #[test]
    fn test_grandchild_keeps_chain_registered() {
        let root = CancellationToken::new();
        let grandchild = root.child().child();
        assert_eq!(root.pending_callbacks(), 1);

        root.cancel("root stop");
        assert!(grandchild.is_cancelled());
        assert_eq!(grandchild.reason(), Some("root stop".to_string()));
    }

    #[test]
    fn test_dropping_grandchild_releases_chain() {
        let root = CancellationToken::new();
        drop(root.child().child());
        assert_eq!(root.pending_callbacks(), 0);
    }

    #[test]
    fn test_child_of_cancelled_parent() {
        let parent = CancellationToken::new();
        parent.cancel("already");

        assert!(parent.child().is_cancelled());
    }
}
