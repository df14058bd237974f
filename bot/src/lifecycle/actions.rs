//! Actions for the request lifecycle.

use crate::lifecycle::LifecycleError;
use crate::lifecycle::types::{
    CorrelationId, DecisionOutcome, DraftId, PendingDraft, RemovalOutcome,
};
use whitelist_core::request::{ChannelId, Decision, GameAccount, UserId, WhitelistRequest};

/// Commands sent to the lifecycle reducer and the results its effects report.
///
/// Every command carries a correlation id and ends in exactly one result
/// action carrying the same id. `RemoveResolved` and `ExpireDraft` are
/// internal and have no result of their own.
#[derive(Debug, Clone)]
pub enum LifecycleAction {
    // Commands
    /// Check whether a submitter may open the request form.
    CheckEligibility {
        /// Command id
        correlation_id: CorrelationId,
        /// Who wants to submit
        submitter: UserId,
    },

    /// Validate a submission and stage it as a draft.
    Submit {
        /// Command id
        correlation_id: CorrelationId,
        /// Who is submitting
        submitter: UserId,
        /// Their display tag
        tag: String,
        /// Requested account
        game_account: GameAccount,
    },

    /// Persist the submitter's staged draft.
    Confirm {
        /// Command id
        correlation_id: CorrelationId,
        /// Draft owner
        submitter: UserId,
    },

    /// Drop the submitter's staged draft.
    Cancel {
        /// Command id
        correlation_id: CorrelationId,
        /// Draft owner
        submitter: UserId,
    },

    /// Apply a staff decision.
    Decide {
        /// Command id
        correlation_id: CorrelationId,
        /// Whose request
        submitter: UserId,
        /// What to do
        decision: Decision,
        /// Acting staff member's tag
        staff: String,
    },

    /// Revoke an account and delete its record.
    Remove {
        /// Command id
        correlation_id: CorrelationId,
        /// Account to remove
        game_account: GameAccount,
        /// Acting staff member's tag
        staff: String,
    },

    /// Forget the ticket associated with a channel.
    CloseTicket {
        /// Command id
        correlation_id: CorrelationId,
        /// The ticket channel
        channel: ChannelId,
    },

    /// A removal found its record; take the submitter's guard and delete it.
    RemoveResolved {
        /// Command id
        correlation_id: CorrelationId,
        /// Record the account resolved to
        record: WhitelistRequest,
        /// Acting staff member's tag
        staff: String,
    },

    /// Drop a draft that was never confirmed.
    ExpireDraft {
        /// Draft owner
        submitter: UserId,
        /// The draft that was staged when the timer started
        draft_id: DraftId,
    },

    // Results
    /// The submitter may open the request form.
    Eligible {
        /// Answered command
        correlation_id: CorrelationId,
    },

    /// A draft was staged.
    DraftStaged {
        /// Answered command
        correlation_id: CorrelationId,
        /// The draft
        draft: PendingDraft,
    },

    /// A draft was persisted as a `PENDING` request.
    Confirmed {
        /// Answered command
        correlation_id: CorrelationId,
        /// Draft that was persisted
        draft_id: DraftId,
        /// Record as stored
        record: WhitelistRequest,
    },

    /// A draft was dropped (or there was none).
    DraftCancelled {
        /// Answered command
        correlation_id: CorrelationId,
    },

    /// A decision was committed.
    Decided {
        /// Answered command
        correlation_id: CorrelationId,
        /// What happened
        outcome: DecisionOutcome,
    },

    /// A record was deleted.
    Removed {
        /// Answered command
        correlation_id: CorrelationId,
        /// What happened
        outcome: RemovalOutcome,
    },

    /// A ticket channel was closed.
    TicketClosed {
        /// Answered command
        correlation_id: CorrelationId,
        /// Submitter the ticket belonged to, if it was tracked
        submitter: Option<UserId>,
    },

    /// A command failed.
    Rejected {
        /// Answered command
        correlation_id: CorrelationId,
        /// Submitter whose guard the command held, if any
        submitter: Option<UserId>,
        /// Why
        error: LifecycleError,
    },
}

impl LifecycleAction {
    /// Correlation id of a result action; `None` for commands.
    #[must_use]
    pub const fn result_for(&self) -> Option<CorrelationId> {
        match self {
            Self::Eligible { correlation_id }
            | Self::DraftStaged { correlation_id, .. }
            | Self::Confirmed { correlation_id, .. }
            | Self::DraftCancelled { correlation_id }
            | Self::Decided { correlation_id, .. }
            | Self::Removed { correlation_id, .. }
            | Self::TicketClosed { correlation_id, .. }
            | Self::Rejected { correlation_id, .. } => Some(*correlation_id),
            _ => None,
        }
    }

    /// Whether this is the result of command `id`
    #[must_use]
    pub fn answers(&self, id: CorrelationId) -> bool {
        self.result_for() == Some(id)
    }

    /// Short name for logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CheckEligibility { .. } => "check_eligibility",
            Self::Submit { .. } => "submit",
            Self::Confirm { .. } => "confirm",
            Self::Cancel { .. } => "cancel",
            Self::Decide { .. } => "decide",
            Self::Remove { .. } => "remove",
            Self::RemoveResolved { .. } => "remove_resolved",
            Self::CloseTicket { .. } => "close_ticket",
            Self::ExpireDraft { .. } => "expire_draft",
            Self::Eligible { .. } => "eligible",
            Self::DraftStaged { .. } => "draft_staged",
            Self::Confirmed { .. } => "confirmed",
            Self::DraftCancelled { .. } => "draft_cancelled",
            Self::Decided { .. } => "decided",
            Self::Removed { .. } => "removed",
            Self::TicketClosed { .. } => "ticket_closed",
            Self::Rejected { .. } => "rejected",
        }
    }
}
