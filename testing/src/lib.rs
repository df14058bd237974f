//! # Whitelist Testing
//!
//! Testing utilities for the whitelist request bot.
//!
//! This crate provides:
//! - A fixed [`Clock`] for deterministic request and processing stamps
//! - In-memory implementations of the record store, access directory and
//!   messenger, each with a switch to simulate an outage
//! - [`ReducerTest`], a Given/When/Then builder for reducer unit tests
//! - Fixtures for building requests
//!
//! ## Example
//!
//! ```ignore
//! use whitelist_testing::{InMemoryRecordStore, InMemoryDirectory, test_clock};
//!
//! #[tokio::test]
//! async fn approve_grants_membership() {
//!     let records = Arc::new(InMemoryRecordStore::new());
//!     let directory = Arc::new(InMemoryDirectory::new());
//!     let engine = engine_with(records.clone(), directory.clone());
//!
//!     engine.approve(submitter, staff).await.unwrap();
//!     assert!(directory.contains("Steve"));
//! }
//! ```

use chrono::{DateTime, Utc};
use whitelist_core::environment::Clock;

mod directory;
mod messenger;
mod records;

pub use directory::InMemoryDirectory;
pub use messenger::{BOT_USER, RecordingMessenger, SentMessage};
pub use records::InMemoryRecordStore;
pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::RwLock;

    /// Clock for deterministic tests
    ///
    /// Returns the same time until [`FixedClock::advance`] moves it.
    ///
    /// # Example
    ///
    /// ```
    /// use whitelist_testing::mocks::FixedClock;
    /// use whitelist_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time: RwLock::new(time) }
        }

        /// Move the clock forward
        #[allow(clippy::unwrap_used)] // Test infrastructure
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += by;
        }
    }

    impl Clock for FixedClock {
        #[allow(clippy::unwrap_used)] // Test infrastructure
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Never in practice; the timestamp is a literal.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Request fixtures
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use whitelist_core::request::{GameAccount, Processing, RequestStatus, UserId, WhitelistRequest};

    /// A request for `name` by `submitter`, in `status`, created at `at`.
    ///
    /// Non-pending requests carry a processing stamp by `staff#0001` at the same time.
    #[must_use]
    pub fn request_at(
        submitter: &str,
        name: &str,
        status: RequestStatus,
        at: DateTime<Utc>,
    ) -> WhitelistRequest {
        WhitelistRequest {
            submitter_id: UserId::new(submitter),
            submitter_tag: format!("user{submitter}"),
            game_account: GameAccount::from_stored(name),
            requested_at: at,
            status,
            processed: (status != RequestStatus::Pending)
                .then(|| Processing { by: "staff#0001".to_string(), at }),
        }
    }

    /// [`request_at`] stamped with the default test time
    #[must_use]
    pub fn request(submitter: &str, name: &str, status: RequestStatus) -> WhitelistRequest {
        request_at(submitter, name, status, super::test_clock_time())
    }
}

fn test_clock_time() -> DateTime<Utc> {
    mocks::test_clock().now()
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        assert_eq!(time1, clock.now());

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now() - time1, chrono::Duration::minutes(5));
    }

    #[test]
    fn fixtures_stamp_processing_only_when_decided() {
        use whitelist_core::request::RequestStatus;

        let pending = fixtures::request("1", "Steve", RequestStatus::Pending);
        assert!(pending.processed.is_none());

        let denied = fixtures::request("1", "Steve", RequestStatus::Denied);
        assert!(denied.processed.is_some());
    }
}
