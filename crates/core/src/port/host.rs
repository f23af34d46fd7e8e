// Host Ports
// The environment that owns a registry: idle signal and temp-file cleanup.

/// Hosting environment of a registry
pub trait ServiceHost: Send + Sync {
    /// The registry went idle and shut its worker down; it may be torn down
    fn on_idle(&self);
}

/// Temporary copies of import sources
pub trait ImportCache: Send + Sync {
    /// Delete every cached copy. Returns the number of files removed.
    fn clear(&self) -> std::io::Result<usize>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct CountingHost {
        idle_calls: AtomicUsize,
    }

    impl CountingHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn idle_calls(&self) -> usize {
            self.idle_calls.load(Ordering::SeqCst)
        }
    }

    impl ServiceHost for CountingHost {
        fn on_idle(&self) {
            self.idle_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    pub struct CountingCache {
        clears: AtomicUsize,
    }

    impl CountingCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn clears(&self) -> usize {
            self.clears.load(Ordering::SeqCst)
        }
    }

    impl ImportCache for CountingCache {
        fn clear(&self) -> std::io::Result<usize> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }
}
