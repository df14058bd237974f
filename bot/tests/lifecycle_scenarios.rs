//! End-to-end lifecycle scenarios through the engine and its real store.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

mod support;

use std::time::Duration;
use support::{harness, harness_with};
use whitelist_bot::LifecycleError;
use whitelist_core::request::{GameAccount, RequestStatus, UserId};
use whitelist_testing::fixtures;

fn steve() -> GameAccount {
    GameAccount::parse("Steve").unwrap()
}

#[tokio::test]
async fn request_to_approval() {
    let h = harness();
    let engine = &h.services.engine;
    let user = UserId::new("1");

    engine.check_eligibility(&user).await.unwrap();
    let draft = engine.submit(&user, "user1".into(), steve()).await.unwrap();
    assert_eq!(draft.request.status, RequestStatus::Pending);
    assert!(h.records.is_empty());

    let record = engine.confirm(&user).await.unwrap();
    assert_eq!(record.game_account, steve());
    assert_eq!(engine.check_eligibility(&user).await, Err(LifecycleError::AlreadyPending));

    let outcome = engine.approve(&user, "mod#0001").await.unwrap();
    assert!(outcome.directory_synced);
    assert_eq!(outcome.record.status, RequestStatus::Approved);
    assert!(h.directory.contains("steve"));

    let stored = h.records.snapshot("1").unwrap();
    let processed = stored.processed.unwrap();
    assert_eq!(processed.by, "mod#0001");
    assert_eq!(engine.check_eligibility(&user).await, Err(LifecycleError::AlreadyApproved));
}

#[tokio::test]
async fn denied_players_may_ask_again() {
    let h = harness();
    let engine = &h.services.engine;
    let user = UserId::new("1");

    engine.submit(&user, "user1".into(), steve()).await.unwrap();
    engine.confirm(&user).await.unwrap();
    engine.deny(&user, "mod#0001").await.unwrap();
    assert!(!h.directory.contains("steve"));

    engine.check_eligibility(&user).await.unwrap();
    engine.submit(&user, "user1".into(), GameAccount::parse("Alex").unwrap()).await.unwrap();
    let record = engine.confirm(&user).await.unwrap();

    assert_eq!(record.status, RequestStatus::Pending);
    assert_eq!(h.records.len(), 1);
    assert_eq!(h.records.snapshot("1").unwrap().game_account.as_str(), "Alex");
}

#[tokio::test]
async fn approved_names_cannot_be_claimed_twice() {
    let h = harness_with(vec![fixtures::request("1", "Steve", RequestStatus::Approved)]);
    let result = h.services.engine.submit(&UserId::new("2"), "user2".into(), GameAccount::parse("sTeVe").unwrap()).await;
    assert_eq!(result.unwrap_err(), LifecycleError::NameAlreadyClaimed);
}

#[tokio::test]
async fn second_escalation_points_at_the_open_ticket() {
    let h = harness_with(vec![fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let engine = &h.services.engine;
    let user = UserId::new("1");

    let outcome = engine.escalate(&user, "mod#0001").await.unwrap();
    let channel = outcome.ticket.clone().unwrap();
    assert_eq!(h.messenger.created_channels().len(), 1);
    assert_eq!(engine.ticket_of(&user).await, Some(channel.clone()));

    let again = engine.escalate(&user, "mod#0001").await;
    assert_eq!(again.unwrap_err(), LifecycleError::TicketAlreadyOpen(channel.clone()));
    assert_eq!(h.messenger.created_channels().len(), 1);

    // A ticket can still be decided
    engine.approve(&user, "mod#0001").await.unwrap();
    assert_eq!(engine.close_ticket(&channel).await.unwrap(), Some(user));
}

#[tokio::test]
async fn concurrent_approvals_write_the_directory_once() {
    let h = harness_with(vec![fixtures::request("1", "Steve", RequestStatus::Pending)]);
    h.directory.set_latency(Duration::from_millis(100));
    let user = UserId::new("1");

    let first = h.services.engine.clone();
    let second = h.services.engine.clone();
    let (a, b) = tokio::join!(first.approve(&user, "mod#0001"), second.approve(&user, "mod#0002"));

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(LifecycleError::InvalidTransition(_)))));
    assert_eq!(h.directory.writes(), 1);
}

#[tokio::test]
async fn removal_and_approval_of_one_record_do_not_interleave() {
    let h = harness();
    let engine = &h.services.engine;
    let user = UserId::new("1");
    engine.submit(&user, "user1".into(), steve()).await.unwrap();
    engine.confirm(&user).await.unwrap();
    h.directory.set_latency(Duration::from_millis(100));

    let remover = engine.clone();
    let removal = tokio::spawn(async move { remover.remove(&steve(), "mod#0001").await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let approval = engine.approve(&user, "mod#0002").await;

    assert!(removal.await.unwrap().is_ok());
    assert!(matches!(approval, Err(LifecycleError::InvalidTransition(_))));
    assert!(h.records.snapshot("1").is_none());
    assert!(!h.directory.contains("steve"));
}

#[tokio::test]
async fn shutdown_does_not_wait_for_draft_expiry() {
    let h = harness();
    let engine = &h.services.engine;
    engine.submit(&UserId::new("1"), "user1".into(), steve()).await.unwrap();

    engine.shutdown(Duration::from_millis(500)).await.unwrap();
}

#[tokio::test]
async fn removal_revokes_once() {
    let h = harness_with(vec![fixtures::request("1", "Steve", RequestStatus::Pending)]);
    let engine = &h.services.engine;
    engine.approve(&UserId::new("1"), "mod#0001").await.unwrap();
    assert!(h.directory.contains("steve"));

    let removed = engine.remove(&GameAccount::parse("STEVE").unwrap(), "mod#0001").await.unwrap();
    assert!(removed.directory_synced);
    assert_eq!(removed.record.submitter_id, UserId::new("1"));
    assert!(!h.directory.contains("steve"));
    assert!(h.records.is_empty());

    let again = engine.remove(&steve(), "mod#0001").await;
    assert_eq!(again.unwrap_err(), LifecycleError::NotFound);
}

#[tokio::test]
async fn directory_outage_is_reported_not_rolled_back() {
    let h = harness_with(vec![fixtures::request("1", "Steve", RequestStatus::Pending)]);
    h.directory.set_failing(true);

    let outcome = h.services.engine.approve(&UserId::new("1"), "mod#0001").await.unwrap();
    assert!(!outcome.directory_synced);
    assert_eq!(outcome.partial_failure(), Some(LifecycleError::DirectoryUpdateFailed("Steve".into())));
    assert_eq!(h.records.snapshot("1").unwrap().status, RequestStatus::Approved);
}

#[tokio::test]
async fn lookup_ignores_case() {
    let h = harness_with(vec![
        fixtures::request("1", "Steve", RequestStatus::Denied),
        fixtures::request("2", "steve", RequestStatus::Approved),
    ]);
    let found = h.services.engine.lookup_by_account("STEVE").await.unwrap().unwrap();
    assert_eq!(found.submitter_id, UserId::new("2"));
    assert_eq!(h.services.engine.lookup_by_account("Notch").await.unwrap(), None);
}

#[tokio::test]
async fn listing_pages_through_every_request() {
    let records = (0..23).map(|i| fixtures::request(&i.to_string(), &format!("Player{i}"), RequestStatus::Pending));
    let h = harness_with(records.collect());

    let last = h.services.engine.list_page(99).await.unwrap();
    assert_eq!(last.total, 23);
    assert_eq!(last.total_pages, 3);
    assert_eq!(last.page, 2);
    assert_eq!(last.items.len(), 3);
    assert!(!last.has_next());
    assert_eq!(h.services.engine.count_by_status(RequestStatus::Pending).await.unwrap(), 23);
}
