//! Request/response facade over the lifecycle store.

use crate::lifecycle::types::{
    CorrelationId, DecisionOutcome, LifecycleState, ListPage, PendingDraft, RemovalOutcome,
};
use crate::lifecycle::{LifecycleAction, LifecycleEnvironment, LifecycleError, LifecycleReducer};
use std::sync::Arc;
use std::time::Duration;
use whitelist_core::record_store::RecordStore;
use whitelist_core::request::{ChannelId, Decision, GameAccount, RequestStatus, UserId, WhitelistRequest};
use whitelist_runtime::{Store, StoreError};

/// Default bound on a single engine call
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(10);

/// The store running the lifecycle reducer
pub type LifecycleStore = Store<LifecycleState, LifecycleAction, LifecycleEnvironment, LifecycleReducer>;

/// Typed entry point to the lifecycle.
///
/// Commands go through the store and wait for their result action; reads go
/// straight to the record store. Cheap to clone.
///
/// # Example
///
/// ```ignore
/// let engine = LifecycleEngine::new(environment);
/// engine.submit(user, "alex".into(), GameAccount::parse("Steve")?).await?;
/// let record = engine.confirm(&user).await?;
/// engine.approve(&user, "mod#0001").await?;
/// ```
#[derive(Clone)]
pub struct LifecycleEngine {
    store: LifecycleStore,
    records: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl LifecycleEngine {
    /// Start a lifecycle store over `environment`.
    #[must_use]
    pub fn new(environment: LifecycleEnvironment) -> Self {
        let records = Arc::clone(&environment.records);
        let store = Store::new(LifecycleState::new(), LifecycleReducer::new(), environment);
        Self { store, records, timeout: DEFAULT_ENGINE_TIMEOUT }
    }

    /// Override the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn dispatch(
        &self,
        command: impl FnOnce(CorrelationId) -> LifecycleAction + Send,
    ) -> Result<LifecycleAction, LifecycleError> {
        let correlation_id = CorrelationId::new();
        let action = command(correlation_id);
        let name = action.name();
        metrics::counter!("lifecycle.commands", "command" => name).increment(1);

        let result = self
            .store
            .send_and_wait_for(action, move |a| a.answers(correlation_id), self.timeout)
            .await;
        match result {
            Ok(LifecycleAction::Rejected { error, .. }) => Err(error),
            Ok(answer) => Ok(answer),
            Err(error @ StoreError::Timeout) => {
                tracing::error!(command = name, %correlation_id, "Lifecycle command timed out");
                Err(error.into())
            },
            Err(error) => Err(error.into()),
        }
    }

    /// Check, before showing the request form, whether the submitter may submit.
    ///
    /// # Errors
    ///
    /// `AlreadyApproved`, `AlreadyPending` or `StoreUnavailable`.
    #[tracing::instrument(skip_all, fields(submitter = %submitter))]
    pub async fn check_eligibility(&self, submitter: &UserId) -> Result<(), LifecycleError> {
        let submitter = submitter.clone();
        match self.dispatch(|correlation_id| LifecycleAction::CheckEligibility { correlation_id, submitter }).await? {
            LifecycleAction::Eligible { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Validate a submission and stage it as a draft.
    ///
    /// # Errors
    ///
    /// `AlreadyApproved`, `AlreadyPending`, `NameAlreadyClaimed` or `StoreUnavailable`.
    #[tracing::instrument(skip_all, fields(submitter = %submitter, account = %game_account))]
    pub async fn submit(
        &self,
        submitter: &UserId,
        tag: String,
        game_account: GameAccount,
    ) -> Result<PendingDraft, LifecycleError> {
        let submitter = submitter.clone();
        let answer = self
            .dispatch(|correlation_id| LifecycleAction::Submit { correlation_id, submitter, tag, game_account })
            .await?;
        match answer {
            LifecycleAction::DraftStaged { draft, .. } => Ok(draft),
            other => Err(unexpected(&other)),
        }
    }

    /// Persist the submitter's draft as a `PENDING` request.
    ///
    /// # Errors
    ///
    /// `NotFound` without a draft, `AlreadyPending` while another confirmation
    /// runs, `AlreadyApproved`, `NameAlreadyClaimed` or `StoreUnavailable`.
    #[tracing::instrument(skip_all, fields(submitter = %submitter))]
    pub async fn confirm(&self, submitter: &UserId) -> Result<WhitelistRequest, LifecycleError> {
        let submitter = submitter.clone();
        match self.dispatch(|correlation_id| LifecycleAction::Confirm { correlation_id, submitter }).await? {
            LifecycleAction::Confirmed { record, .. } => Ok(record),
            other => Err(unexpected(&other)),
        }
    }

    /// Drop the submitter's draft. Never fails; store problems are logged.
    #[tracing::instrument(skip_all, fields(submitter = %submitter))]
    pub async fn cancel(&self, submitter: &UserId) {
        let submitter = submitter.clone();
        if let Err(error) = self.dispatch(|correlation_id| LifecycleAction::Cancel { correlation_id, submitter }).await {
            tracing::warn!(%error, "Draft cancellation not processed");
        }
    }

    /// Apply a staff decision to a submitter's request.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidTransition` (including a decision already in
    /// progress), `TicketAlreadyOpen` for a second escalation, or `StoreUnavailable`.
    #[tracing::instrument(skip_all, fields(submitter = %submitter, %decision))]
    pub async fn decide(
        &self,
        submitter: &UserId,
        decision: Decision,
        staff: &str,
    ) -> Result<DecisionOutcome, LifecycleError> {
        let submitter = submitter.clone();
        let staff = staff.to_string();
        let answer = self
            .dispatch(|correlation_id| LifecycleAction::Decide { correlation_id, submitter, decision, staff })
            .await?;
        match answer {
            LifecycleAction::Decided { outcome, .. } => Ok(outcome),
            other => Err(unexpected(&other)),
        }
    }

    /// Approve and grant whitelist membership.
    ///
    /// # Errors
    ///
    /// See [`LifecycleEngine::decide`].
    pub async fn approve(&self, submitter: &UserId, staff: &str) -> Result<DecisionOutcome, LifecycleError> {
        self.decide(submitter, Decision::Approve, staff).await
    }

    /// Deny.
    ///
    /// # Errors
    ///
    /// See [`LifecycleEngine::decide`].
    pub async fn deny(&self, submitter: &UserId, staff: &str) -> Result<DecisionOutcome, LifecycleError> {
        self.decide(submitter, Decision::Deny, staff).await
    }

    /// Move to a ticket channel.
    ///
    /// # Errors
    ///
    /// See [`LifecycleEngine::decide`].
    pub async fn escalate(&self, submitter: &UserId, staff: &str) -> Result<DecisionOutcome, LifecycleError> {
        self.decide(submitter, Decision::Escalate, staff).await
    }

    /// Revoke an account and delete its record, whatever its status.
    ///
    /// # Errors
    ///
    /// `NotFound` if no record matches (case-insensitively), or `StoreUnavailable`.
    #[tracing::instrument(skip_all, fields(account = %game_account))]
    pub async fn remove(&self, game_account: &GameAccount, staff: &str) -> Result<RemovalOutcome, LifecycleError> {
        let game_account = game_account.clone();
        let staff = staff.to_string();
        let answer = self
            .dispatch(|correlation_id| LifecycleAction::Remove { correlation_id, game_account, staff })
            .await?;
        match answer {
            LifecycleAction::Removed { outcome, .. } => Ok(outcome),
            other => Err(unexpected(&other)),
        }
    }

    /// Forget the ticket held by `channel`; returns whose ticket it was.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store is shutting down or times out.
    #[tracing::instrument(skip_all, fields(channel = %channel))]
    pub async fn close_ticket(&self, channel: &ChannelId) -> Result<Option<UserId>, LifecycleError> {
        let channel = channel.clone();
        match self.dispatch(|correlation_id| LifecycleAction::CloseTicket { correlation_id, channel }).await? {
            LifecycleAction::TicketClosed { submitter, .. } => Ok(submitter),
            other => Err(unexpected(&other)),
        }
    }

    /// Submitter whose ticket lives in `channel`
    pub async fn ticket_owner(&self, channel: &ChannelId) -> Option<UserId> {
        self.store.state(|s| s.ticket_in(channel).map(|t| t.submitter.clone())).await
    }

    /// Ticket channel currently open for `submitter`
    pub async fn ticket_of(&self, submitter: &UserId) -> Option<ChannelId> {
        self.store.state(|s| s.tickets.get(submitter).map(|t| t.channel.clone())).await
    }

    /// The submitter's unconfirmed draft
    pub async fn draft(&self, submitter: &UserId) -> Option<PendingDraft> {
        self.store.state(|s| s.drafts.get(submitter).cloned()).await
    }

    /// Most relevant record for an account, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn lookup_by_account(&self, name: &str) -> Result<Option<WhitelistRequest>, LifecycleError> {
        Ok(self.records.get_by_game_account(name.to_string(), true).await?)
    }

    /// A submitter's record.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn lookup_by_submitter(&self, submitter: &UserId) -> Result<Option<WhitelistRequest>, LifecycleError> {
        Ok(self.records.get_by_submitter(submitter.clone()).await?)
    }

    /// One page of all requests, newest first.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn list_page(&self, page: usize) -> Result<ListPage, LifecycleError> {
        let records = self.records.list_all().await?;
        Ok(ListPage::paginate(records, page))
    }

    /// Number of requests with `status`.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn count_by_status(&self, status: RequestStatus) -> Result<u64, LifecycleError> {
        Ok(self.records.count_by_status(status).await?)
    }

    /// Stop accepting commands and wait for running effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }
}

fn unexpected(action: &LifecycleAction) -> LifecycleError {
    tracing::error!(action = action.name(), "Unexpected lifecycle result");
    LifecycleError::StoreUnavailable(format!("unexpected result: {}", action.name()))
}
