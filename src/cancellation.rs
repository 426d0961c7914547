//! Cooperative cancellation token (SPEC_FULL.md §5 "Cancellation"): checked
//! between permutations and between forward/backward search steps. Not tied
//! to any single run — a caller holds the handle and flips it from another
//! thread (a UI cancel button, a timeout, a signal handler) while a
//! `candidate_search*` call is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shareable, thread-safe cancellation flag. Cloning shares the same
/// underlying flag; [`CancellationToken::cancel`] from any clone is visible
/// to every worker checking [`CancellationToken::is_cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_a_clone() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
