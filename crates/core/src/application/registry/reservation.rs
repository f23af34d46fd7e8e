// Destination Reservation Table
//
// Paths currently claimed by export jobs. Lives inside the registry state and
// is only touched under the registry lock.

use crate::domain::JobId;
use std::collections::HashMap;

/// path -> owning job
#[derive(Debug, Default)]
pub struct ReservationTable {
    owners: HashMap<String, JobId>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` for `owner`. False if another job already holds it.
    pub fn try_reserve(&mut self, path: &str, owner: JobId) -> bool {
        if self.owners.contains_key(path) {
            return false;
        }
        self.owners.insert(path.to_string(), owner);
        true
    }

    /// Remove the claim only if `owner` still holds it. No-op otherwise.
    pub fn release_if_owner(&mut self, path: &str, owner: JobId) -> bool {
        if self.owners.get(path) == Some(&owner) {
            self.owners.remove(path);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.owners.contains_key(path)
    }

    pub fn owner_of(&self, path: &str) -> Option<JobId> {
        self.owners.get(path).copied()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }
}
