//! In-process whitelist for development without a game server.

use super::DirectoryBackend;
use std::collections::BTreeSet;
use whitelist_core::directory::DirectoryError;

/// Lowercased set of member names.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    members: BTreeSet<String>,
}

impl MemoryBackend {
    /// Empty whitelist
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current members, sorted
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }
}

impl DirectoryBackend for MemoryBackend {
    fn is_member(&mut self, name: &str) -> Result<bool, DirectoryError> {
        Ok(self.members.contains(&name.to_ascii_lowercase()))
    }

    fn set_member(&mut self, name: &str, member: bool) -> Result<(), DirectoryError> {
        let key = name.to_ascii_lowercase();
        if member {
            self.members.insert(key);
        } else {
            self.members.remove(&key);
        }
        Ok(())
    }
}
