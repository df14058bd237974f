//! Unit tests for `LifecycleReducer`.
//!
//! Synchronous bookkeeping is checked with `ReducerTest`; flows that need the
//! record store go through `drive`, which runs an action's futures inline and
//! reduces their results, the way the store does.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code

use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use whitelist_core::environment::Clock;
use whitelist_core::messaging::{MessagingError, MessagingFuture};
use whitelist_core::record_store::RecordStore;
use whitelist_core::reducer::Reducer;
use whitelist_core::request::{ChannelId, Decision, GameAccount, RequestStatus, UserId, WhitelistRequest};
use whitelist_testing::{InMemoryDirectory, InMemoryRecordStore, ReducerTest, assertions, fixtures, test_clock};

/// Ticket desk that hands out `ticket-<name>` channels
#[derive(Default)]
struct StubDesk {
    failing: bool,
    opened: AtomicUsize,
}

impl TicketDesk for StubDesk {
    fn open_ticket(&self, record: WhitelistRequest, _staff: String) -> MessagingFuture<'_, ChannelId> {
        Box::pin(async move {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(MessagingError::Transport("offline".into()));
            }
            Ok(ChannelId::new(format!("ticket-{}", record.game_account.key())))
        })
    }
}

struct Fixture {
    records: InMemoryRecordStore,
    directory: InMemoryDirectory,
    desk: Arc<StubDesk>,
    env: LifecycleEnvironment,
}

fn fixture_with(records: InMemoryRecordStore, desk: StubDesk) -> Fixture {
    let directory = InMemoryDirectory::new();
    let desk = Arc::new(desk);
    let env = LifecycleEnvironment::new(
        Arc::new(records.clone()),
        Arc::new(directory.clone()),
        desk.clone(),
        Arc::new(test_clock()),
    );
    Fixture { records, directory, desk, env }
}

fn fixture(records: impl IntoIterator<Item = WhitelistRequest>) -> Fixture {
    fixture_with(InMemoryRecordStore::with_records(records), StubDesk::default())
}

fn user(id: &str) -> UserId {
    UserId::new(id)
}

fn account(name: &str) -> GameAccount {
    GameAccount::parse(name).unwrap()
}

fn draft_for(submitter: &str, name: &str) -> PendingDraft {
    let request = fixtures::request(submitter, name, RequestStatus::Pending);
    PendingDraft { draft_id: DraftId::new(), staged_at: request.requested_at, request }
}

/// Reduce `action`, run its futures inline, reduce what they produce and
/// return the result action. Internal follow-ups are reduced on the way.
async fn drive(state: &mut LifecycleState, action: LifecycleAction, env: &LifecycleEnvironment) -> LifecycleAction {
    let mut effects = LifecycleReducer.reduce(state, action, env).into_vec();
    loop {
        let mut produced = assertions::resolve_futures(effects).await;
        assert_eq!(produced.len(), 1, "every command yields exactly one result");
        let next = produced.remove(0);
        let follow_up = LifecycleReducer.reduce(state, next.clone(), env).into_vec();
        if next.result_for().is_some() {
            return next;
        }
        effects = follow_up;
    }
}

async fn submit(state: &mut LifecycleState, env: &LifecycleEnvironment, who: &str, name: &str) -> LifecycleAction {
    let action = LifecycleAction::Submit {
        correlation_id: CorrelationId::new(),
        submitter: user(who),
        tag: format!("user{who}"),
        game_account: account(name),
    };
    drive(state, action, env).await
}

async fn confirm(state: &mut LifecycleState, env: &LifecycleEnvironment, who: &str) -> LifecycleAction {
    drive(state, LifecycleAction::Confirm { correlation_id: CorrelationId::new(), submitter: user(who) }, env).await
}

async fn decide(state: &mut LifecycleState, env: &LifecycleEnvironment, who: &str, decision: Decision) -> LifecycleAction {
    let action = LifecycleAction::Decide {
        correlation_id: CorrelationId::new(),
        submitter: user(who),
        decision,
        staff: "mod#0001".into(),
    };
    drive(state, action, env).await
}

fn rejection(action: &LifecycleAction) -> &LifecycleError {
    match action {
        LifecycleAction::Rejected { error, .. } => error,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

fn decided(action: LifecycleAction) -> DecisionOutcome {
    match action {
        LifecycleAction::Decided { outcome, .. } => outcome,
        other => panic!("expected a decision, got {other:?}"),
    }
}

// ============================================================================
// Drafts
// ============================================================================

#[test]
fn staging_a_draft_schedules_its_expiry() {
    let f = fixture([]);
    let draft = draft_for("1", "Steve");
    let draft_id = draft.draft_id;

    ReducerTest::new(LifecycleReducer::new())
        .with_env(f.env)
        .given_state(LifecycleState::new())
        .when_action(LifecycleAction::DraftStaged { correlation_id: CorrelationId::new(), draft })
        .then_state(move |state| assert_eq!(state.drafts[&user("1")].draft_id, draft_id))
        .then_effects(move |effects| {
            let (duration, action) = assertions::delayed_action(effects);
            assert_eq!(duration, DEFAULT_DRAFT_TTL);
            assert!(matches!(action, LifecycleAction::ExpireDraft { draft_id: id, .. } if id == draft_id));
        })
        .run();
}

#[test]
fn zero_ttl_disables_expiry() {
    let f = fixture([]);
    ReducerTest::new(LifecycleReducer::new())
        .with_env(f.env.with_draft_ttl(Duration::ZERO))
        .given_state(LifecycleState::new())
        .when_action(LifecycleAction::DraftStaged { correlation_id: CorrelationId::new(), draft: draft_for("1", "Steve") })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn stale_expiry_keeps_the_newer_draft() {
    let f = fixture([]);
    let first = draft_for("1", "Steve");
    let second = draft_for("1", "Alex");
    let (first_id, second_id) = (first.draft_id, second.draft_id);

    ReducerTest::new(LifecycleReducer::new())
        .with_env(f.env)
        .given_state(LifecycleState::new())
        .when_actions([
            LifecycleAction::DraftStaged { correlation_id: CorrelationId::new(), draft: first },
            LifecycleAction::DraftStaged { correlation_id: CorrelationId::new(), draft: second },
            LifecycleAction::ExpireDraft { submitter: user("1"), draft_id: first_id },
        ])
        .then_state(move |state| {
            assert_eq!(state.drafts[&user("1")].draft_id, second_id);
            assert_eq!(state.drafts[&user("1")].request.game_account.as_str(), "Alex");
        })
        .run();
}

#[test]
fn matching_expiry_drops_the_draft() {
    let f = fixture([]);
    let draft = draft_for("1", "Steve");
    let draft_id = draft.draft_id;

    ReducerTest::new(LifecycleReducer::new())
        .with_env(f.env)
        .given_state(LifecycleState::new())
        .when_actions([
            LifecycleAction::DraftStaged { correlation_id: CorrelationId::new(), draft },
            LifecycleAction::ExpireDraft { submitter: user("1"), draft_id },
        ])
        .then_state(|state| assert!(state.drafts.is_empty()))
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn expiry_waits_for_a_running_confirmation() {
    let f = fixture([]);
    let draft = draft_for("1", "Steve");
    let draft_id = draft.draft_id;
    let mut state = LifecycleState::new();
    state.drafts.insert(user("1"), draft);

    ReducerTest::new(LifecycleReducer::new())
        .with_env(f.env)
        .given_state(state)
        .when_actions([
            LifecycleAction::Confirm { correlation_id: CorrelationId::new(), submitter: user("1") },
            LifecycleAction::ExpireDraft { submitter: user("1"), draft_id },
        ])
        .then_state(|state| {
            assert!(state.drafts.contains_key(&user("1")));
            assert!(state.in_flight.contains_key(&user("1")));
        })
        .run();
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let f = fixture([]);
    let mut state = LifecycleState::new();
    state.drafts.insert(user("1"), draft_for("1", "Steve"));

    for _ in 0..2 {
        let result = drive(&mut state, LifecycleAction::Cancel { correlation_id: CorrelationId::new(), submitter: user("1") }, &f.env).await;
        assert!(matches!(result, LifecycleAction::DraftCancelled { .. }));
    }
    assert!(state.drafts.is_empty());
    assert!(f.records.is_empty());
}

// ============================================================================
// Submit and confirm
// ============================================================================

#[tokio::test]
async fn eligibility_follows_the_existing_record() {
    let f = fixture([
        fixtures::request("1", "Steve", RequestStatus::Approved),
        fixtures::request("2", "Alex", RequestStatus::Pending),
        fixtures::request("3", "Notch", RequestStatus::Denied),
        fixtures::request("4", "Jeb", RequestStatus::Ticket),
    ]);
    let mut state = LifecycleState::new();

    let check = |who: &str| LifecycleAction::CheckEligibility { correlation_id: CorrelationId::new(), submitter: user(who) };
    assert_eq!(rejection(&drive(&mut state, check("1"), &f.env).await), &LifecycleError::AlreadyApproved);
    assert_eq!(rejection(&drive(&mut state, check("2"), &f.env).await), &LifecycleError::AlreadyPending);
    assert!(matches!(drive(&mut state, check("3"), &f.env).await, LifecycleAction::Eligible { .. }));
    assert!(matches!(drive(&mut state, check("4"), &f.env).await, LifecycleAction::Eligible { .. }));
    assert!(matches!(drive(&mut state, check("5"), &f.env).await, LifecycleAction::Eligible { .. }));
}

#[tokio::test]
async fn submit_stages_without_persisting() {
    let f = fixture([]);
    let mut state = LifecycleState::new();

    let result = submit(&mut state, &f.env, "1", "Steve").await;
    let LifecycleAction::DraftStaged { draft, .. } = result else { panic!("expected a draft") };
    assert_eq!(draft.request.status, RequestStatus::Pending);
    assert_eq!(draft.request.requested_at, test_clock().now());
    assert_eq!(state.drafts[&user("1")], draft);
    assert!(f.records.is_empty());
}

#[tokio::test]
async fn submit_rejects_a_name_approved_for_someone_else() {
    let f = fixture([fixtures::request("9", "steve", RequestStatus::Approved)]);
    let mut state = LifecycleState::new();

    let result = submit(&mut state, &f.env, "1", "STEVE").await;
    assert_eq!(rejection(&result), &LifecycleError::NameAlreadyClaimed);
    assert!(state.drafts.is_empty());
}

#[tokio::test]
async fn confirm_persists_and_discards_the_draft() {
    let f = fixture([]);
    let mut state = LifecycleState::new();
    submit(&mut state, &f.env, "1", "Steve").await;

    let result = confirm(&mut state, &f.env, "1").await;
    assert!(matches!(result, LifecycleAction::Confirmed { .. }));
    assert_eq!(f.records.snapshot("1").unwrap().status, RequestStatus::Pending);
    assert!(state.drafts.is_empty());
    assert!(state.in_flight.is_empty());

    let again = confirm(&mut state, &f.env, "1").await;
    assert_eq!(rejection(&again), &LifecycleError::NotFound);
}

#[tokio::test]
async fn confirm_rechecks_the_name_claim() {
    let f = fixture([]);
    let mut state = LifecycleState::new();
    submit(&mut state, &f.env, "2", "steve").await;

    // Somebody else got approved for the name in the meantime
    f.records.create(fixtures::request("1", "Steve", RequestStatus::Approved)).await.unwrap();

    let result = confirm(&mut state, &f.env, "2").await;
    assert_eq!(rejection(&result), &LifecycleError::NameAlreadyClaimed);
    assert!(f.records.snapshot("2").is_none());
    assert!(state.drafts.is_empty());
    assert!(state.in_flight.is_empty());
}

#[tokio::test]
async fn unavailable_store_keeps_the_draft_for_a_retry() {
    let f = fixture([]);
    let mut state = LifecycleState::new();
    submit(&mut state, &f.env, "1", "Steve").await;

    f.records.set_unavailable(true);
    let result = confirm(&mut state, &f.env, "1").await;
    assert!(matches!(rejection(&result), LifecycleError::StoreUnavailable(_)));
    assert!(state.drafts.contains_key(&user("1")));
    assert!(state.in_flight.is_empty());

    f.records.set_unavailable(false);
    assert!(matches!(confirm(&mut state, &f.env, "1").await, LifecycleAction::Confirmed { .. }));
}

#[tokio::test]
async fn concurrent_confirm_is_already_pending() {
    let f = fixture([]);
    let mut state = LifecycleState::new();
    submit(&mut state, &f.env, "1", "Steve").await;

    // First confirmation holds the guard; its effect has not run yet
    let first = LifecycleReducer.reduce(
        &mut state,
        LifecycleAction::Confirm { correlation_id: CorrelationId::new(), submitter: user("1") },
        &f.env,
    );
    let second = confirm(&mut state, &f.env, "1").await;
    assert_eq!(rejection(&second), &LifecycleError::AlreadyPending);
    assert!(state.in_flight.contains_key(&user("1")), "loser must not release the winner's guard");

    for result in assertions::resolve_futures(first.into_vec()).await {
        LifecycleReducer.reduce(&mut state, result, &f.env);
    }
    assert!(state.in_flight.is_empty());
    assert_eq!(f.records.len(), 1);
}

// ============================================================================
// Decisions
// ============================================================================

#[tokio::test]
async fn approve_grants_membership_and_cannot_repeat() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let mut state = LifecycleState::new();

    let outcome = decided(decide(&mut state, &f.env, "1", Decision::Approve).await);
    assert_eq!(outcome.record.status, RequestStatus::Approved);
    assert_eq!(outcome.record.processed.as_ref().unwrap().by, "mod#0001");
    assert!(outcome.directory_synced);
    assert!(outcome.partial_failure().is_none());
    assert!(f.directory.contains("steve"));

    let again = decide(&mut state, &f.env, "1", Decision::Approve).await;
    assert!(matches!(rejection(&again), LifecycleError::InvalidTransition(_)));
    assert_eq!(f.directory.writes(), 1);
}

#[tokio::test]
async fn decision_while_another_runs_is_invalid() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let mut state = LifecycleState::new();

    let first = LifecycleReducer.reduce(
        &mut state,
        LifecycleAction::Decide {
            correlation_id: CorrelationId::new(),
            submitter: user("1"),
            decision: Decision::Approve,
            staff: "a#1".into(),
        },
        &f.env,
    );
    let second = decide(&mut state, &f.env, "1", Decision::Deny).await;
    assert!(matches!(rejection(&second), LifecycleError::InvalidTransition(_)));

    for result in assertions::resolve_futures(first.into_vec()).await {
        LifecycleReducer.reduce(&mut state, result, &f.env);
    }
    assert_eq!(f.records.snapshot("1").unwrap().status, RequestStatus::Approved);
    assert_eq!(f.directory.writes(), 1);
    assert!(state.in_flight.is_empty());
}

#[tokio::test]
async fn directory_outage_does_not_roll_back_approval() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    f.directory.set_failing(true);
    let mut state = LifecycleState::new();

    let outcome = decided(decide(&mut state, &f.env, "1", Decision::Approve).await);
    assert!(!outcome.directory_synced);
    assert_eq!(outcome.partial_failure(), Some(LifecycleError::DirectoryUpdateFailed("Steve".into())));
    assert_eq!(f.records.snapshot("1").unwrap().status, RequestStatus::Approved);
}

#[tokio::test]
async fn deny_leaves_the_directory_alone() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let mut state = LifecycleState::new();

    let outcome = decided(decide(&mut state, &f.env, "1", Decision::Deny).await);
    assert_eq!(outcome.record.status, RequestStatus::Denied);
    assert_eq!(f.directory.writes(), 0);
}

#[tokio::test]
async fn unknown_submitter_is_not_found() {
    let f = fixture([]);
    let mut state = LifecycleState::new();
    let result = decide(&mut state, &f.env, "404", Decision::Deny).await;
    assert_eq!(rejection(&result), &LifecycleError::NotFound);
    assert!(state.in_flight.is_empty());
}

#[tokio::test]
async fn escalation_opens_one_ticket() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let mut state = LifecycleState::new();

    let outcome = decided(decide(&mut state, &f.env, "1", Decision::Escalate).await);
    let channel = ChannelId::new("ticket-steve");
    assert_eq!(outcome.ticket, Some(channel.clone()));
    assert_eq!(outcome.record.status, RequestStatus::Ticket);
    assert_eq!(state.tickets[&user("1")].channel, channel);

    let again = decide(&mut state, &f.env, "1", Decision::Escalate).await;
    assert_eq!(rejection(&again), &LifecycleError::TicketAlreadyOpen(channel));
    assert_eq!(f.desk.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_ticket_channel_still_marks_ticket() {
    let records = InMemoryRecordStore::with_records([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let f = fixture_with(records, StubDesk { failing: true, ..StubDesk::default() });
    let mut state = LifecycleState::new();

    let outcome = decided(decide(&mut state, &f.env, "1", Decision::Escalate).await);
    assert_eq!(outcome.ticket, None);
    assert_eq!(f.records.snapshot("1").unwrap().status, RequestStatus::Ticket);
    assert!(state.tickets.is_empty());

    // No channel is tracked, but TICKET cannot be escalated again
    let again = decide(&mut state, &f.env, "1", Decision::Escalate).await;
    assert!(matches!(rejection(&again), LifecycleError::InvalidTransition(_)));
}

#[tokio::test]
async fn ticket_can_still_be_approved() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let mut state = LifecycleState::new();
    decide(&mut state, &f.env, "1", Decision::Escalate).await;

    let outcome = decided(decide(&mut state, &f.env, "1", Decision::Approve).await);
    assert_eq!(outcome.record.status, RequestStatus::Approved);
    assert!(f.directory.contains("Steve"));
}

// ============================================================================
// Removal and tickets
// ============================================================================

#[tokio::test]
async fn remove_revokes_then_reports_not_found() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let mut state = LifecycleState::new();
    decide(&mut state, &f.env, "1", Decision::Approve).await;

    let remove = || LifecycleAction::Remove {
        correlation_id: CorrelationId::new(),
        game_account: account("STEVE"),
        staff: "mod#0001".into(),
    };
    let LifecycleAction::Removed { outcome, .. } = drive(&mut state, remove(), &f.env).await else {
        panic!("expected removal")
    };
    assert!(outcome.directory_synced);
    assert_eq!(outcome.record.submitter_id, user("1"));
    assert!(!f.directory.contains("Steve"));
    assert!(f.records.is_empty());

    let again = drive(&mut state, remove(), &f.env).await;
    assert_eq!(rejection(&again), &LifecycleError::NotFound);
    assert!(!f.directory.contains("Steve"));
}

#[tokio::test]
async fn removal_respects_a_decision_in_progress() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let mut state = LifecycleState::new();
    let decision = CorrelationId::new();
    state.in_flight.insert(user("1"), InFlight::Decide { correlation_id: decision });

    let remove = LifecycleAction::Remove {
        correlation_id: CorrelationId::new(),
        game_account: account("Steve"),
        staff: "mod#0001".into(),
    };
    let result = drive(&mut state, remove, &f.env).await;
    assert!(matches!(rejection(&result), LifecycleError::InvalidTransition(_)));
    assert_eq!(f.records.len(), 1);
    assert_eq!(f.directory.writes(), 0);
    assert_eq!(state.in_flight.get(&user("1")), Some(&InFlight::Decide { correlation_id: decision }));
}

#[tokio::test]
async fn decisions_wait_for_a_removal_in_progress() {
    let f = fixture([fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let mut state = LifecycleState::new();
    let record = f.records.snapshot("1").unwrap();
    let removal = CorrelationId::new();

    let effects = LifecycleReducer.reduce(
        &mut state,
        LifecycleAction::RemoveResolved { correlation_id: removal, record, staff: "mod#0001".into() },
        &f.env,
    );
    assert_eq!(state.in_flight.get(&user("1")), Some(&InFlight::Remove { correlation_id: removal }));

    let blocked = decide(&mut state, &f.env, "1", Decision::Approve).await;
    assert!(matches!(rejection(&blocked), LifecycleError::InvalidTransition(_)));

    let mut produced = assertions::resolve_futures(effects.into_vec()).await;
    let removed = produced.remove(0);
    assert!(matches!(removed, LifecycleAction::Removed { .. }));
    LifecycleReducer.reduce(&mut state, removed, &f.env);
    assert!(state.in_flight.is_empty());
    assert!(f.records.is_empty());
    assert!(!f.directory.contains("Steve"));
}

#[tokio::test]
async fn closing_a_ticket_reports_its_owner() {
    let f = fixture([]);
    let mut state = LifecycleState::new();
    let channel = ChannelId::new("ticket-steve");
    state.tickets.insert(
        user("1"),
        TicketChannel { submitter: user("1"), channel: channel.clone(), opened_at: test_clock().now() },
    );

    let close = |c: &ChannelId| LifecycleAction::CloseTicket { correlation_id: CorrelationId::new(), channel: c.clone() };
    let result = drive(&mut state, close(&channel), &f.env).await;
    assert!(matches!(result, LifecycleAction::TicketClosed { submitter: Some(ref s), .. } if *s == user("1")));
    assert!(state.tickets.is_empty());

    let untracked = drive(&mut state, close(&channel), &f.env).await;
    assert!(matches!(untracked, LifecycleAction::TicketClosed { submitter: None, .. }));
}

#[test]
fn foreign_rejection_keeps_the_guard() {
    let f = fixture([]);
    let holder = CorrelationId::new();
    let mut state = LifecycleState::new();
    state.in_flight.insert(user("1"), InFlight::Decide { correlation_id: holder });

    ReducerTest::new(LifecycleReducer::new())
        .with_env(f.env)
        .given_state(state)
        .when_action(LifecycleAction::Rejected {
            correlation_id: CorrelationId::new(),
            submitter: Some(user("1")),
            error: LifecycleError::NotFound,
        })
        .then_state(move |state| assert_eq!(state.in_flight[&user("1")].correlation_id(), holder))
        .then_effects(assertions::assert_no_effects)
        .run();
}
