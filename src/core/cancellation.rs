//! Cooperative cancellation for long-running evaluations

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::{FhirPathError, Result};

/// Cancellation handle checked between AST node evaluations and on each
/// iteration of iterator-style functions (`where`, `select`, `repeat`,
/// `aggregate`, `sort`).
///
/// Cloning the token shares the underlying flag, so a caller can keep one
/// clone and hand the other to the evaluation context.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that never fires unless [`cancel`](Self::cancel) is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. All clones of this token observe the signal.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Return `Err(Cancelled)` if cancellation has been signaled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FhirPathError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(FhirPathError::Cancelled)));
    }
}
