//! Drop guard that fires a cancellation token.

use super::CancellationToken;

/// Cancels a token when dropped, unless disarmed first.
#[derive(Debug)]
pub struct CancelGuard {
    token: Option<CancellationToken>,
    reason: &'static str,
}

impl CancelGuard {
    /// Creates a guard that cancels `token` with `reason` on drop.
    #[must_use]
    pub fn new(token: CancellationToken, reason: &'static str) -> Self {
        Self {
            token: Some(token),
            reason,
        }
    }

    /// Disarms the guard, leaving the token untouched on drop.
    pub fn disarm(&mut self) {
        self.token = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel(self.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_cancels_on_drop() {
        let token = CancellationToken::new();
        {
            let _guard = CancelGuard::new(token.clone(), "scope ended");
        }

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("scope ended".to_string()));
    }

    #[test]
    fn test_guard_disarm() {
        let token = CancellationToken::new();
        {
            let mut guard = CancelGuard::new(token.clone(), "scope ended");
            guard.disarm();
        }

        assert!(!token.is_cancelled());
    }
}
