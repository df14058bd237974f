//! Environment for the lifecycle reducer.

use std::sync::Arc;
use std::time::Duration;
use whitelist_core::directory::AccessDirectory;
use whitelist_core::environment::Clock;
use whitelist_core::messaging::MessagingFuture;
use whitelist_core::record_store::RecordStore;
use whitelist_core::request::{ChannelId, WhitelistRequest};

/// Default lifetime of an unconfirmed draft
pub const DEFAULT_DRAFT_TTL: Duration = Duration::from_secs(900);

/// Opens discussion channels for escalated requests.
///
/// Implemented by the notification dispatcher.
pub trait TicketDesk: Send + Sync {
    /// Create the ticket channel for `record`, opened by `staff`.
    fn open_ticket(&self, record: WhitelistRequest, staff: String) -> MessagingFuture<'_, ChannelId>;
}

/// Collaborators injected into the lifecycle reducer.
#[derive(Clone)]
pub struct LifecycleEnvironment {
    /// Persisted requests
    pub records: Arc<dyn RecordStore>,
    /// Game server whitelist
    pub directory: Arc<dyn AccessDirectory>,
    /// Ticket channel factory
    pub tickets: Arc<dyn TicketDesk>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Draft lifetime; zero disables expiry
    pub draft_ttl: Duration,
}

impl LifecycleEnvironment {
    /// Create an environment with the default draft lifetime.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        directory: Arc<dyn AccessDirectory>,
        tickets: Arc<dyn TicketDesk>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { records, directory, tickets, clock, draft_ttl: DEFAULT_DRAFT_TTL }
    }

    /// Override the draft lifetime.
    #[must_use]
    pub const fn with_draft_ttl(mut self, draft_ttl: Duration) -> Self {
        self.draft_ttl = draft_ttl;
        self
    }
}
