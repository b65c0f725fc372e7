// src/core/cancel.rs
// Cooperative cancellation shared by the scheduler and the lookup generators.
// Checked between chunks, between dispatch batches, and between pool tasks; a
// hard kill of an in-flight GPU submission is not practical.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable cancellation flag. Cloning is cheap and all clones observe the
/// same state.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; there is no way to un-cancel.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
