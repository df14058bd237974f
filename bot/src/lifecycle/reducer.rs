//! Reducer for the request lifecycle.
//!
//! The reducer owns drafts, ticket channels and the per-submitter guard. It
//! never awaits: every record store, directory or channel call runs inside an
//! `Effect::Future` whose result action is reduced again before anyone waiting
//! on it is woken.

use crate::lifecycle::environment::LifecycleEnvironment;
use crate::lifecycle::types::{
    CorrelationId, DecisionOutcome, DraftId, InFlight, LifecycleState, PendingDraft,
    RemovalOutcome, TicketChannel,
};
use crate::lifecycle::{LifecycleAction, LifecycleError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use whitelist_core::record_store::RecordStore;
use whitelist_core::request::{Decision, GameAccount, RequestStatus, UserId, WhitelistRequest};
use whitelist_core::{SmallVec, async_effect, delay, effect::Effect, reducer::Reducer, respond, smallvec};

/// Reducer for whitelist requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleReducer;

impl LifecycleReducer {
    /// Create a new lifecycle reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn rejected(correlation_id: CorrelationId, submitter: Option<UserId>, error: LifecycleError) -> LifecycleAction {
    LifecycleAction::Rejected { correlation_id, submitter, error }
}

/// Drop the draft of `submitter` if it is still `draft_id`.
fn discard_draft(state: &mut LifecycleState, submitter: &UserId, draft_id: DraftId) {
    if state.drafts.get(submitter).is_some_and(|d| d.draft_id == draft_id) {
        state.drafts.remove(submitter);
    }
}

// ============================================================================
// Effect bodies
// ============================================================================

/// `APPROVED` and `PENDING` records block a new submission.
async fn ensure_can_submit(records: &dyn RecordStore, submitter: &UserId) -> Result<(), LifecycleError> {
    match records.get_by_submitter(submitter.clone()).await? {
        Some(existing) if existing.status == RequestStatus::Approved => Err(LifecycleError::AlreadyApproved),
        Some(existing) if existing.status == RequestStatus::Pending => Err(LifecycleError::AlreadyPending),
        _ => Ok(()),
    }
}

/// The account must not be approved for somebody else.
async fn ensure_name_free(
    records: &dyn RecordStore,
    submitter: &UserId,
    account: &GameAccount,
) -> Result<(), LifecycleError> {
    match records.get_by_game_account(account.as_str().to_string(), true).await? {
        Some(holder) if holder.status == RequestStatus::Approved && &holder.submitter_id != submitter => {
            Err(LifecycleError::NameAlreadyClaimed)
        },
        _ => Ok(()),
    }
}

async fn stage_draft(
    records: &dyn RecordStore,
    submitter: UserId,
    tag: String,
    account: GameAccount,
    now: DateTime<Utc>,
) -> Result<PendingDraft, LifecycleError> {
    ensure_can_submit(records, &submitter).await?;
    ensure_name_free(records, &submitter, &account).await?;
    Ok(PendingDraft {
        draft_id: DraftId::new(),
        request: WhitelistRequest::new(submitter, tag, account, now),
        staged_at: now,
    })
}

async fn persist_draft(records: &dyn RecordStore, draft: &PendingDraft) -> Result<WhitelistRequest, LifecycleError> {
    let request = &draft.request;
    // Another submitter may have been approved for the name since staging
    ensure_can_submit(records, &request.submitter_id).await?;
    ensure_name_free(records, &request.submitter_id, &request.game_account).await?;
    records.create(request.clone()).await?;
    tracing::info!(
        submitter = %request.submitter_id,
        account = %request.game_account,
        "Whitelist request persisted"
    );
    Ok(request.clone())
}

async fn apply_decision(
    env: &LifecycleEnvironment,
    submitter: &UserId,
    decision: Decision,
    staff: &str,
    at: DateTime<Utc>,
) -> Result<DecisionOutcome, LifecycleError> {
    let mut record = env
        .records
        .get_by_submitter(submitter.clone())
        .await?
        .ok_or(LifecycleError::NotFound)?;
    record.apply(decision, staff, at)?;
    if !env.records.update(record.clone()).await? {
        return Err(LifecycleError::NotFound);
    }
    tracing::info!(
        submitter = %submitter,
        account = %record.game_account,
        status = %record.status,
        staff,
        "Decision committed"
    );

    let mut outcome = DecisionOutcome { record, decision, directory_synced: true, ticket: None };
    match decision {
        Decision::Approve => {
            let account = outcome.record.game_account.as_str().to_string();
            if let Err(error) = env.directory.set_member(account, true).await {
                // The approval stands; the whitelist must be fixed by hand
                tracing::warn!(
                    submitter = %submitter,
                    account = %outcome.record.game_account,
                    %error,
                    "Request approved but the game server whitelist was not updated"
                );
                outcome.directory_synced = false;
            }
        },
        Decision::Escalate => {
            match env.tickets.open_ticket(outcome.record.clone(), staff.to_string()).await {
                Ok(channel) => outcome.ticket = Some(channel),
                Err(error) => tracing::warn!(
                    submitter = %submitter,
                    account = %outcome.record.game_account,
                    %error,
                    "Request escalated but the ticket channel could not be created"
                ),
            }
        },
        Decision::Deny => {},
    }
    Ok(outcome)
}

async fn resolve_removal(records: &dyn RecordStore, account: &GameAccount) -> Result<WhitelistRequest, LifecycleError> {
    records
        .get_by_game_account(account.as_str().to_string(), true)
        .await?
        .ok_or(LifecycleError::NotFound)
}

/// Revoke and delete under the submitter's guard.
async fn remove_record(
    env: &LifecycleEnvironment,
    submitter: &UserId,
    account: &GameAccount,
    staff: &str,
) -> Result<RemovalOutcome, LifecycleError> {
    // Re-read: the record may have changed between resolution and the guard
    let record = env
        .records
        .get_by_submitter(submitter.clone())
        .await?
        .filter(|r| r.game_account.matches(account.as_str()))
        .ok_or(LifecycleError::NotFound)?;

    let mut directory_synced = true;
    let name = record.game_account.as_str().to_string();
    if let Err(error) = env.directory.set_member(name, false).await {
        tracing::warn!(
            submitter = %record.submitter_id,
            account = %record.game_account,
            %error,
            "Could not revoke whitelist membership"
        );
        directory_synced = false;
    }

    if !env.records.delete(record.submitter_id.clone()).await? {
        return Err(LifecycleError::NotFound);
    }
    tracing::info!(
        submitter = %record.submitter_id,
        account = %record.game_account,
        staff,
        "Player removed"
    );
    Ok(RemovalOutcome { record, directory_synced })
}

// ============================================================================
// Reducer
// ============================================================================

impl Reducer for LifecycleReducer {
    type State = LifecycleState;
    type Action = LifecycleAction;
    type Environment = LifecycleEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        tracing::trace!(action = action.name(), "Reducing lifecycle action");

        match action {
            // ========== Commands ==========
            LifecycleAction::CheckEligibility { correlation_id, submitter } => {
                let records = Arc::clone(&env.records);
                smallvec![async_effect! {
                    Some(match ensure_can_submit(records.as_ref(), &submitter).await {
                        Ok(()) => LifecycleAction::Eligible { correlation_id },
                        Err(error) => rejected(correlation_id, None, error),
                    })
                }]
            },

            LifecycleAction::Submit { correlation_id, submitter, tag, game_account } => {
                let records = Arc::clone(&env.records);
                let now = env.clock.now();
                smallvec![async_effect! {
                    Some(match stage_draft(records.as_ref(), submitter, tag, game_account, now).await {
                        Ok(draft) => LifecycleAction::DraftStaged { correlation_id, draft },
                        Err(error) => rejected(correlation_id, None, error),
                    })
                }]
            },

            LifecycleAction::Confirm { correlation_id, submitter } => {
                let Some(draft) = state.drafts.get(&submitter).cloned() else {
                    return smallvec![respond!(rejected(correlation_id, None, LifecycleError::NotFound))];
                };
                if state.in_flight.contains_key(&submitter) {
                    return smallvec![respond!(rejected(correlation_id, None, LifecycleError::AlreadyPending))];
                }
                state
                    .in_flight
                    .insert(submitter.clone(), InFlight::Confirm { correlation_id, draft_id: draft.draft_id });

                let records = Arc::clone(&env.records);
                smallvec![async_effect! {
                    Some(match persist_draft(records.as_ref(), &draft).await {
                        Ok(record) => LifecycleAction::Confirmed {
                            correlation_id,
                            draft_id: draft.draft_id,
                            record,
                        },
                        Err(error) => rejected(correlation_id, Some(submitter), error),
                    })
                }]
            },

            LifecycleAction::Cancel { correlation_id, submitter } => {
                if state.drafts.remove(&submitter).is_some() {
                    tracing::debug!(submitter = %submitter, "Draft cancelled");
                }
                smallvec![respond!(LifecycleAction::DraftCancelled { correlation_id })]
            },

            LifecycleAction::Decide { correlation_id, submitter, decision, staff } => {
                if state.in_flight.contains_key(&submitter) {
                    let error = LifecycleError::InvalidTransition(
                        "request is already being processed".to_string(),
                    );
                    return smallvec![respond!(rejected(correlation_id, None, error))];
                }
                if decision == Decision::Escalate {
                    if let Some(ticket) = state.tickets.get(&submitter) {
                        let error = LifecycleError::TicketAlreadyOpen(ticket.channel.clone());
                        return smallvec![respond!(rejected(correlation_id, None, error))];
                    }
                }
                state.in_flight.insert(submitter.clone(), InFlight::Decide { correlation_id });

                let env = env.clone();
                let now = env.clock.now();
                smallvec![async_effect! {
                    Some(match apply_decision(&env, &submitter, decision, &staff, now).await {
                        Ok(outcome) => LifecycleAction::Decided { correlation_id, outcome },
                        Err(error) => rejected(correlation_id, Some(submitter), error),
                    })
                }]
            },

            LifecycleAction::Remove { correlation_id, game_account, staff } => {
                let records = Arc::clone(&env.records);
                smallvec![async_effect! {
                    Some(match resolve_removal(records.as_ref(), &game_account).await {
                        Ok(record) => LifecycleAction::RemoveResolved { correlation_id, record, staff },
                        Err(error) => rejected(correlation_id, None, error),
                    })
                }]
            },

            LifecycleAction::RemoveResolved { correlation_id, record, staff } => {
                let submitter = record.submitter_id;
                if state.in_flight.contains_key(&submitter) {
                    let error = LifecycleError::InvalidTransition(
                        "request is already being processed".to_string(),
                    );
                    return smallvec![respond!(rejected(correlation_id, None, error))];
                }
                state.in_flight.insert(submitter.clone(), InFlight::Remove { correlation_id });

                let env = env.clone();
                let account = record.game_account;
                smallvec![async_effect! {
                    Some(match remove_record(&env, &submitter, &account, &staff).await {
                        Ok(outcome) => LifecycleAction::Removed { correlation_id, outcome },
                        Err(error) => rejected(correlation_id, Some(submitter), error),
                    })
                }]
            },

            LifecycleAction::CloseTicket { correlation_id, channel } => {
                let submitter = state.ticket_in(&channel).map(|t| t.submitter.clone());
                if let Some(owner) = &submitter {
                    state.tickets.remove(owner);
                    tracing::info!(submitter = %owner, channel = %channel, "Ticket closed");
                }
                smallvec![respond!(LifecycleAction::TicketClosed { correlation_id, submitter })]
            },

            LifecycleAction::ExpireDraft { submitter, draft_id } => {
                let confirming = matches!(
                    state.in_flight.get(&submitter),
                    Some(InFlight::Confirm { draft_id: held, .. }) if *held == draft_id
                );
                if !confirming && state.drafts.get(&submitter).is_some_and(|d| d.draft_id == draft_id) {
                    state.drafts.remove(&submitter);
                    tracing::debug!(submitter = %submitter, "Unconfirmed draft expired");
                }
                smallvec![Effect::None]
            },

            // ========== Results ==========
            LifecycleAction::DraftStaged { draft, .. } => {
                let submitter = draft.request.submitter_id.clone();
                let draft_id = draft.draft_id;
                if state.drafts.insert(submitter.clone(), draft).is_some() {
                    tracing::debug!(submitter = %submitter, "Previous draft superseded");
                }
                if env.draft_ttl.is_zero() {
                    smallvec![Effect::None]
                } else {
                    smallvec![delay! {
                        duration: env.draft_ttl,
                        action: LifecycleAction::ExpireDraft { submitter, draft_id }
                    }]
                }
            },

            LifecycleAction::Confirmed { correlation_id, draft_id, record } => {
                state.release(&record.submitter_id, correlation_id);
                discard_draft(state, &record.submitter_id, draft_id);
                metrics::counter!("lifecycle.transitions", "to" => record.status.as_str()).increment(1);
                smallvec![Effect::None]
            },

            LifecycleAction::Decided { correlation_id, outcome } => {
                let submitter = &outcome.record.submitter_id;
                state.release(submitter, correlation_id);
                if let Some(channel) = &outcome.ticket {
                    state.tickets.insert(
                        submitter.clone(),
                        TicketChannel {
                            submitter: submitter.clone(),
                            channel: channel.clone(),
                            opened_at: env.clock.now(),
                        },
                    );
                }
                metrics::counter!("lifecycle.transitions", "to" => outcome.record.status.as_str())
                    .increment(1);
                smallvec![Effect::None]
            },

            LifecycleAction::Removed { correlation_id, outcome } => {
                state.release(&outcome.record.submitter_id, correlation_id);
                metrics::counter!("lifecycle.transitions", "to" => "REMOVED").increment(1);
                smallvec![Effect::None]
            },

            LifecycleAction::Rejected { correlation_id, submitter, error } => {
                metrics::counter!("lifecycle.rejections", "reason" => error.reason()).increment(1);
                tracing::debug!(%correlation_id, %error, "Lifecycle command rejected");
                if let Some(submitter) = submitter {
                    if let Some(InFlight::Confirm { draft_id, .. }) = state.release(&submitter, correlation_id) {
                        // Keep the draft so the submitter can retry once the store is back
                        if !matches!(error, LifecycleError::StoreUnavailable(_)) {
                            discard_draft(state, &submitter, draft_id);
                        }
                    }
                }
                smallvec![Effect::None]
            },

            LifecycleAction::Eligible { .. }
            | LifecycleAction::DraftCancelled { .. }
            | LifecycleAction::TicketClosed { .. } => smallvec![Effect::None],
        }
    }
}
