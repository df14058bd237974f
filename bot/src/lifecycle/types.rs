//! Core types for the request lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use whitelist_core::request::{ChannelId, Decision, UserId, WhitelistRequest};

/// Identifier tying a lifecycle command to the result action that answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new correlation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one staged draft, so a stale expiry cannot drop a newer draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftId(Uuid);

impl DraftId {
    /// Generate a new draft ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

/// A submission that has been validated but not yet confirmed.
///
/// Lives only in memory. Confirming persists `request`; cancelling,
/// expiring or staging a newer draft drops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDraft {
    /// Identity of this draft
    pub draft_id: DraftId,
    /// The request that will be persisted on confirmation
    pub request: WhitelistRequest,
    /// When the draft was staged
    pub staged_at: DateTime<Utc>,
}

/// A discussion channel opened for a submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketChannel {
    /// Whose request is being discussed
    pub submitter: UserId,
    /// The channel
    pub channel: ChannelId,
    /// When it was opened
    pub opened_at: DateTime<Utc>,
}

/// What currently holds the per-submitter guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlight {
    /// A confirmation persisting the given draft
    Confirm {
        /// Command being processed
        correlation_id: CorrelationId,
        /// Draft being persisted
        draft_id: DraftId,
    },
    /// A staff decision
    Decide {
        /// Command being processed
        correlation_id: CorrelationId,
    },
    /// A removal revoking and deleting the record
    Remove {
        /// Command being processed
        correlation_id: CorrelationId,
    },
}

impl InFlight {
    /// Command holding the guard
    #[must_use]
    pub const fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::Confirm { correlation_id, .. }
            | Self::Decide { correlation_id }
            | Self::Remove { correlation_id } => *correlation_id,
        }
    }
}

/// State owned by the lifecycle reducer.
///
/// Only mutated under the store's write lock.
#[derive(Debug, Clone, Default)]
pub struct LifecycleState {
    /// Unconfirmed drafts by submitter
    pub drafts: HashMap<UserId, PendingDraft>,
    /// Open ticket channels by submitter
    pub tickets: HashMap<UserId, TicketChannel>,
    /// Submitters with a confirmation, decision or removal in progress
    pub in_flight: HashMap<UserId, InFlight>,
}

impl LifecycleState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The ticket associated with a channel, if any
    #[must_use]
    pub fn ticket_in(&self, channel: &ChannelId) -> Option<&TicketChannel> {
        self.tickets.values().find(|t| &t.channel == channel)
    }

    /// Release the guard for `submitter` if `correlation_id` still holds it.
    pub(crate) fn release(&mut self, submitter: &UserId, correlation_id: CorrelationId) -> Option<InFlight> {
        match self.in_flight.get(submitter) {
            Some(held) if held.correlation_id() == correlation_id => self.in_flight.remove(submitter),
            _ => None,
        }
    }
}

/// Result of a committed staff decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    /// Record as persisted
    pub record: WhitelistRequest,
    /// Decision that was applied
    pub decision: Decision,
    /// Whether the game server whitelist reflects the decision
    pub directory_synced: bool,
    /// Ticket channel opened by an escalation
    pub ticket: Option<ChannelId>,
}

/// Result of removing a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// Record as it was before deletion
    pub record: WhitelistRequest,
    /// Whether membership was revoked on the game server
    pub directory_synced: bool,
}

/// Requests shown per list page
pub const PAGE_SIZE: usize = 10;

/// One page of the request list, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    /// Zero-based page index, clamped to the available pages
    pub page: usize,
    /// Number of pages (at least 1)
    pub total_pages: usize,
    /// Number of requests across all pages
    pub total: usize,
    /// `(position in the full list, request)` for this page
    pub items: Vec<(usize, WhitelistRequest)>,
}

impl ListPage {
    /// Cut page `page` out of `records` (already newest first).
    #[must_use]
    pub fn paginate(records: Vec<WhitelistRequest>, page: usize) -> Self {
        let total = records.len();
        let total_pages = total.div_ceil(PAGE_SIZE).max(1);
        let page = page.min(total_pages - 1);
        let items = records
            .into_iter()
            .enumerate()
            .skip(page * PAGE_SIZE)
            .take(PAGE_SIZE)
            .collect();
        Self { page, total_pages, total, items }
    }

    /// Whether a previous page exists
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// Whether a next page exists
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whitelist_core::request::RequestStatus;
    use whitelist_testing::fixtures;

    fn records(n: usize) -> Vec<WhitelistRequest> {
        (0..n)
            .map(|i| fixtures::request(&i.to_string(), &format!("player{i}"), RequestStatus::Pending))
            .collect()
    }

    #[test]
    fn pages_hold_ten_and_clamp() {
        let page = ListPage::paginate(records(23), 1);
        assert_eq!((page.page, page.total_pages, page.total), (1, 3, 23));
        assert_eq!(page.items.first().map(|(i, _)| *i), Some(10));
        assert!(page.has_previous() && page.has_next());

        let last = ListPage::paginate(records(23), 99);
        assert_eq!(last.page, 2);
        assert_eq!(last.items.len(), 3);
        assert!(!last.has_next());
    }

    #[test]
    fn empty_list_has_one_empty_page() {
        let page = ListPage::paginate(Vec::new(), 3);
        assert_eq!((page.page, page.total_pages, page.total), (0, 1, 0));
        assert!(page.items.is_empty());
        assert!(!page.has_previous() && !page.has_next());
    }

    #[test]
    fn release_requires_matching_correlation() {
        let mut state = LifecycleState::new();
        let submitter = UserId::new("1");
        let holder = CorrelationId::new();
        state.in_flight.insert(submitter.clone(), InFlight::Decide { correlation_id: holder });

        assert!(state.release(&submitter, CorrelationId::new()).is_none());
        assert!(state.in_flight.contains_key(&submitter));
        assert_eq!(state.release(&submitter, holder), Some(InFlight::Decide { correlation_id: holder }));
        assert!(state.in_flight.is_empty());
    }
}
