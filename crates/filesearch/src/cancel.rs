//! Cancellation tokens for scan, search, index, and duplicate operations.
//!
//! A token is a cheaply cloneable handle around a shared atomic flag. All
//! long-running operations accept one and check it at directory-entry and
//! per-file boundaries; a cancelled operation returns whatever partial
//! results it has accumulated rather than an error.
//!
//! ## Sparse checking
//!
//! For tight loops over many small items, `is_cancelled_sparse()` only
//! performs the atomic read every 1,024 iterations to keep overhead low.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How often tight loops should check whether execution was cancelled.
/// A power of 2 allows efficient modulo via bitwise AND.
pub const CANCEL_CHECK_INTERVAL: usize = 0x400; // 1,024

/// A cancellation token for terminating long-running operations early.
///
/// Clones share the same underlying flag, so one handle can be kept by the
/// caller while another travels into the operation.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. All clones of this token observe the request.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation has been requested.
    pub fn cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Checks if this token is still active.
    ///
    /// Returns `Some(())` if still active, `None` if cancelled.
    /// This enables use with the `?` operator for early returns.
    #[inline]
    pub fn is_cancelled(&self) -> Option<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            None
        } else {
            Some(())
        }
    }

    /// Sparse cancellation check - only checks every `CANCEL_CHECK_INTERVAL`
    /// iterations.
    ///
    /// This reduces the overhead of atomic reads in tight loops while still
    /// allowing timely cancellation.
    #[inline]
    pub fn is_cancelled_sparse(&self, counter: usize) -> Option<()> {
        // Bitwise AND for efficient power-of-2 modulo
        if counter & (CANCEL_CHECK_INTERVAL - 1) == 0 {
            self.is_cancelled()
        } else {
            Some(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(token.is_cancelled().is_some());
        assert!(!token.cancel_requested());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled().is_none());
        assert!(clone.cancel_requested());
    }

    #[test]
    fn sparse_check_observes_cancellation_on_interval() {
        let token = CancellationToken::new();
        token.cancel();
        // Off-interval counters skip the atomic read entirely.
        assert!(token.is_cancelled_sparse(1).is_some());
        assert!(token.is_cancelled_sparse(CANCEL_CHECK_INTERVAL).is_none());
    }
}
