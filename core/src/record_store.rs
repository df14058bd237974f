//! Persistent record store abstraction.
//!
//! CRUD over [`WhitelistRequest`] rows keyed by the submitter identity. No
//! business rules live here; the lifecycle engine decides what may be written.
//!
//! # Implementations
//!
//! - `whitelist-sqlite`: `SqliteRecordStore` (production)
//! - `whitelist-testing`: `InMemoryRecordStore` (tests)
//!
//! # Example
//!
//! ```ignore
//! use whitelist_core::record_store::RecordStore;
//!
//! async fn approved_count(store: &dyn RecordStore) -> Result<u64, RecordStoreError> {
//!     store.count_by_status(RequestStatus::Approved).await
//! }
//! ```

use crate::request::{RequestStatus, UserId, WhitelistRequest};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordStoreError {
    /// The backing database could not be reached or rejected the statement.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored row could not be mapped back into a request.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// The store has been shut down or marked unavailable.
    #[error("Record store unavailable")]
    Unavailable,
}

/// Boxed future returned by every [`RecordStore`] method
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RecordStoreError>> + Send + 'a>>;

/// Durable storage of whitelist requests.
///
/// Uses explicit boxed futures so the trait stays dyn-compatible and can be
/// shared as `Arc<dyn RecordStore>`.
pub trait RecordStore: Send + Sync {
    /// Insert a request, replacing any existing row for the same submitter.
    fn create(&self, record: WhitelistRequest) -> StoreFuture<'_, ()>;

    /// Fetch the request of one submitter.
    fn get_by_submitter(&self, submitter: UserId) -> StoreFuture<'_, Option<WhitelistRequest>>;

    /// Fetch the single most relevant request for a game account.
    ///
    /// When several submitters asked for the same name, an `APPROVED` row wins,
    /// then `TICKET`, `PENDING` and `DENIED`; newest first within a status.
    /// With `case_insensitive` the name is compared without regard to case.
    fn get_by_game_account(
        &self,
        name: String,
        case_insensitive: bool,
    ) -> StoreFuture<'_, Option<WhitelistRequest>>;

    /// Overwrite an existing request. Returns `false` if no row matched.
    fn update(&self, record: WhitelistRequest) -> StoreFuture<'_, bool>;

    /// Delete a submitter's request. Returns `false` if no row matched.
    fn delete(&self, submitter: UserId) -> StoreFuture<'_, bool>;

    /// Every request, newest first.
    fn list_all(&self) -> StoreFuture<'_, Vec<WhitelistRequest>>;

    /// Requests with the given status, newest first.
    fn list_by_status(&self, status: RequestStatus) -> StoreFuture<'_, Vec<WhitelistRequest>>;

    /// Number of stored requests.
    fn count(&self) -> StoreFuture<'_, u64>;

    /// Number of stored requests with the given status.
    fn count_by_status(&self, status: RequestStatus) -> StoreFuture<'_, u64>;
}

/// Rank used to pick the most relevant of several requests for one account
#[must_use]
pub const fn relevance_rank(status: RequestStatus) -> u8 {
    match status {
        RequestStatus::Approved => 0,
        RequestStatus::Ticket => 1,
        RequestStatus::Pending => 2,
        RequestStatus::Denied => 3,
    }
}
