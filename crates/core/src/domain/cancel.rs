// Cancellation Token
//
// One token per job. The processor owns the writing side; codec sessions get a
// clone and poll it between reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns false if it was already set.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancelToken::new();
        let session_side = token.clone();

        assert!(!session_side.is_cancelled());
        assert!(token.cancel());
        assert!(session_side.is_cancelled());
        assert!(!token.cancel());
    }
}
