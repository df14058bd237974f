//! In-memory record store.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use whitelist_core::record_store::{RecordStore, RecordStoreError, StoreFuture, relevance_rank};
use whitelist_core::request::{RequestStatus, UserId, WhitelistRequest};

/// `HashMap`-backed [`RecordStore`] for fast, deterministic tests.
///
/// Cloning shares the underlying data. [`InMemoryRecordStore::set_unavailable`]
/// makes every call fail with [`RecordStoreError::Unavailable`].
///
/// # Example
///
/// ```
/// use whitelist_testing::{InMemoryRecordStore, fixtures};
/// use whitelist_core::record_store::RecordStore;
/// use whitelist_core::request::RequestStatus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryRecordStore::new();
/// store.create(fixtures::request("1", "Steve", RequestStatus::Pending)).await?;
///
/// let found = store.get_by_game_account("STEVE".into(), true).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecordStore {
    rows: Arc<RwLock<HashMap<UserId, WhitelistRequest>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRecordStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = WhitelistRequest>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.write().unwrap();
            for record in records {
                rows.insert(record.submitter_id.clone(), record);
            }
        }
        store
    }

    /// Simulate an outage (or recovery)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Synchronous read for assertions
    #[must_use]
    pub fn snapshot(&self, submitter: &str) -> Option<WhitelistRequest> {
        self.rows.read().unwrap().get(&UserId::new(submitter)).cloned()
    }

    /// Number of stored rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    /// Whether the store holds no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), RecordStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RecordStoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn sorted(&self, filter: impl Fn(&WhitelistRequest) -> bool) -> Vec<WhitelistRequest> {
        let mut rows: Vec<_> = self.rows.read().unwrap().values().filter(|r| filter(r)).cloned().collect();
        rows.sort_by_key(|r| Reverse(r.requested_at));
        rows
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create(&self, record: WhitelistRequest) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.rows.write().unwrap().insert(record.submitter_id.clone(), record);
            Ok(())
        })
    }

    fn get_by_submitter(&self, submitter: UserId) -> StoreFuture<'_, Option<WhitelistRequest>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.rows.read().unwrap().get(&submitter).cloned())
        })
    }

    fn get_by_game_account(
        &self,
        name: String,
        case_insensitive: bool,
    ) -> StoreFuture<'_, Option<WhitelistRequest>> {
        Box::pin(async move {
            self.check()?;
            let mut matches = self.sorted(|r| {
                if case_insensitive {
                    r.game_account.matches(&name)
                } else {
                    r.game_account.as_str() == name
                }
            });
            // Stable sort keeps newest-first within a status
            matches.sort_by_key(|r| relevance_rank(r.status));
            Ok(matches.into_iter().next())
        })
    }

    fn update(&self, record: WhitelistRequest) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.check()?;
            let mut rows = self.rows.write().unwrap();
            match rows.get_mut(&record.submitter_id) {
                Some(row) => {
                    *row = record;
                    Ok(true)
                },
                None => Ok(false),
            }
        })
    }

    fn delete(&self, submitter: UserId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.check()?;
            Ok(self.rows.write().unwrap().remove(&submitter).is_some())
        })
    }

    fn list_all(&self) -> StoreFuture<'_, Vec<WhitelistRequest>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.sorted(|_| true))
        })
    }

    fn list_by_status(&self, status: RequestStatus) -> StoreFuture<'_, Vec<WhitelistRequest>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.sorted(|r| r.status == status))
        })
    }

    fn count(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            self.check()?;
            Ok(self.len() as u64)
        })
    }

    fn count_by_status(&self, status: RequestStatus) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            self.check()?;
            Ok(self.sorted(|r| r.status == status).len() as u64)
        })
    }
}
