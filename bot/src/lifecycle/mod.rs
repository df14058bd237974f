//! Request lifecycle engine.
//!
//! The state machine over a request's status, plus the in-memory drafts and
//! ticket channels that go with it.
//!
//! # Architecture
//!
//! ```text
//! Router → LifecycleEngine::confirm()
//!            ↓ send_and_wait_for(Confirm { correlation_id })
//!          Store (write lock) → LifecycleReducer
//!            ↓ guard submitter, return Effect::Future
//!          worker task: record store / access directory / ticket desk
//!            ↓ Confirmed | Rejected { correlation_id }
//!          LifecycleReducer (release guard, drop draft) → broadcast
//!            ↓
//!          LifecycleEngine returns Result<_, LifecycleError>
//! ```
//!
//! All decisions about drafts, tickets and the per-submitter guard are made
//! under the store's single write lock; all I/O happens outside it.

pub mod actions;
pub mod engine;
pub mod environment;
pub mod reducer;
#[cfg(test)]
mod tests;
pub mod types;

pub use actions::LifecycleAction;
pub use engine::LifecycleEngine;
pub use environment::{DEFAULT_DRAFT_TTL, LifecycleEnvironment, TicketDesk};
pub use reducer::LifecycleReducer;
pub use types::{
    CorrelationId, DecisionOutcome, DraftId, InFlight, LifecycleState, ListPage, PAGE_SIZE,
    PendingDraft, RemovalOutcome, TicketChannel,
};

use thiserror::Error;
use whitelist_core::record_store::RecordStoreError;
use whitelist_core::request::{ChannelId, InvalidTransition};
use whitelist_runtime::StoreError;

/// Why a lifecycle command did not go through.
///
/// `Clone` so it can travel inside broadcast result actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No draft or record for the target.
    #[error("Request not found")]
    NotFound,

    /// The submitter already has a request awaiting review.
    #[error("A request is already pending")]
    AlreadyPending,

    /// The submitter is already whitelisted.
    #[error("Already whitelisted")]
    AlreadyApproved,

    /// The account is approved for a different submitter.
    #[error("Account already claimed by another user")]
    NameAlreadyClaimed,

    /// The request's status does not accept the action.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The caller lacks the required role.
    #[error("Permission denied")]
    PermissionDenied,

    /// The record store could not be used.
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// The game server whitelist does not reflect a committed change.
    #[error("Directory update failed for {0}")]
    DirectoryUpdateFailed(String),

    /// A ticket channel is already open for the submitter.
    #[error("Ticket already open in {0}")]
    TicketAlreadyOpen(ChannelId),
}

impl LifecycleError {
    /// Metric label
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyPending => "already_pending",
            Self::AlreadyApproved => "already_approved",
            Self::NameAlreadyClaimed => "name_already_claimed",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::PermissionDenied => "permission_denied",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::DirectoryUpdateFailed(_) => "directory_update_failed",
            Self::TicketAlreadyOpen(_) => "ticket_already_open",
        }
    }
}

impl From<RecordStoreError> for LifecycleError {
    fn from(error: RecordStoreError) -> Self {
        Self::StoreUnavailable(error.to_string())
    }
}

impl From<InvalidTransition> for LifecycleError {
    fn from(error: InvalidTransition) -> Self {
        Self::InvalidTransition(error.to_string())
    }
}

impl From<StoreError> for LifecycleError {
    fn from(error: StoreError) -> Self {
        Self::StoreUnavailable(error.to_string())
    }
}

impl DecisionOutcome {
    /// The partial failure left behind by a committed approval, if any
    #[must_use]
    pub fn partial_failure(&self) -> Option<LifecycleError> {
        (!self.directory_synced)
            .then(|| LifecycleError::DirectoryUpdateFailed(self.record.game_account.to_string()))
    }
}

impl RemovalOutcome {
    /// The partial failure left behind by a removal, if any
    #[must_use]
    pub fn partial_failure(&self) -> Option<LifecycleError> {
        (!self.directory_synced)
            .then(|| LifecycleError::DirectoryUpdateFailed(self.record.game_account.to_string()))
    }
}
