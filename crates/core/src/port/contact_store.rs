// Contact Store Port
// Import commits into it, export pages out of it.

use crate::domain::{AccountRef, ContactEntry, EntryId};
use thiserror::Error;

/// Store errors
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Entry rejected: {0}")]
    Rejected(String),
}

/// Contact store trait
///
/// Methods are synchronous: they are only called from job bodies, which run
/// on the blocking pool.
pub trait ContactStore: Send + Sync {
    /// Persist one entry and return its identifier
    fn commit(
        &self,
        entry: &ContactEntry,
        account: Option<&AccountRef>,
    ) -> Result<EntryId, StoreError>;

    /// Number of exportable entries
    fn count(&self) -> Result<usize, StoreError>;

    /// Entries with id greater than `after`, ascending, at most `limit`
    fn page(
        &self,
        after: Option<EntryId>,
        limit: usize,
    ) -> Result<Vec<(EntryId, ContactEntry)>, StoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Vec-backed store
    pub struct InMemoryContactStore {
        rows: Mutex<Vec<(EntryId, ContactEntry, Option<AccountRef>)>>,
        fail_commits: bool,
    }

    impl InMemoryContactStore {
        pub fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                fail_commits: false,
            }
        }

        pub fn with_entries(count: usize) -> Self {
            let store = Self::new();
            for i in 1..=count {
                store
                    .commit(&ContactEntry::new(format!("Contact {}", i)), None)
                    .unwrap();
            }
            store
        }

        pub fn failing() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                fail_commits: true,
            }
        }

        pub fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn accounts(&self) -> Vec<Option<AccountRef>> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .map(|(_, _, account)| account.clone())
                .collect()
        }
    }

    impl Default for InMemoryContactStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ContactStore for InMemoryContactStore {
        fn commit(
            &self,
            entry: &ContactEntry,
            account: Option<&AccountRef>,
        ) -> Result<EntryId, StoreError> {
            if self.fail_commits {
                return Err(StoreError::Backend("store is read-only".to_string()));
            }
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as EntryId + 1;
            rows.push((id, entry.clone(), account.cloned()));
            Ok(id)
        }

        fn count(&self) -> Result<usize, StoreError> {
            Ok(self.rows.lock().unwrap().len())
        }

        fn page(
            &self,
            after: Option<EntryId>,
            limit: usize,
        ) -> Result<Vec<(EntryId, ContactEntry)>, StoreError> {
            let after = after.unwrap_or(0);
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _, _)| *id > after)
                .take(limit)
                .map(|(id, entry, _)| (*id, entry.clone()))
                .collect())
        }
    }
}
