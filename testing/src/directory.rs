//! In-memory access directory.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use whitelist_core::directory::{AccessDirectory, DirectoryError, DirectoryFuture};

/// Set-backed [`AccessDirectory`] that counts writes.
///
/// Names are stored lowercased. `set_latency` slows every write down so
/// tests can overlap two approvals; `set_failing` makes writes fail.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDirectory {
    members: Arc<RwLock<HashSet<String>>>,
    writes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    latency_ms: Arc<AtomicUsize>,
}

impl InMemoryDirectory {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is a member (synchronous, for assertions)
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.members.read().unwrap().contains(&name.to_ascii_lowercase())
    }

    /// Number of `set_member` calls that reached the directory
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay applied to every write
    pub fn set_latency(&self, latency: Duration) {
        let millis = usize::try_from(latency.as_millis()).unwrap_or(usize::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }
}

impl AccessDirectory for InMemoryDirectory {
    fn is_member(&self, name: String) -> DirectoryFuture<'_, bool> {
        Box::pin(async move { Ok(self.contains(&name)) })
    }

    fn set_member(&self, name: String, member: bool) -> DirectoryFuture<'_, ()> {
        Box::pin(async move {
            let latency = self.latency_ms.load(Ordering::SeqCst);
            if latency > 0 {
                tokio::time::sleep(Duration::from_millis(latency as u64)).await;
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(DirectoryError::Connection("simulated outage".to_string()));
            }
            let key = name.to_ascii_lowercase();
            let mut members = self.members.write().unwrap();
            if member {
                members.insert(key);
            } else {
                members.remove(&key);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn membership_is_case_insensitive() {
        let directory = InMemoryDirectory::new();
        directory.set_member("Steve".into(), true).await.unwrap();
        assert!(directory.is_member("STEVE".into()).await.unwrap());
        directory.set_member("steve".into(), false).await.unwrap();
        assert!(!directory.contains("Steve"));
        assert_eq!(directory.writes(), 2);
    }

    #[tokio::test]
    async fn failing_writes_still_count() {
        let directory = InMemoryDirectory::new();
        directory.set_failing(true);
        assert!(directory.set_member("Alex".into(), true).await.is_err());
        assert!(!directory.contains("Alex"));
        assert_eq!(directory.writes(), 1);
    }
}
