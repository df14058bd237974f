//! Shared wiring for the bot's integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)] // Test code

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use whitelist_bot::app::{Services, assemble};
use whitelist_bot::config::Config;
use whitelist_core::messaging::Invoker;
use whitelist_core::request::{ChannelId, RoleId, UserId, WhitelistRequest};
use whitelist_testing::{BOT_USER, FixedClock, InMemoryDirectory, InMemoryRecordStore, RecordingMessenger, test_clock};

pub const STAFF_ROLE: &str = "55";
pub const ADMIN_CHANNEL: &str = "3000";
pub const REQUEST_CHANNEL: &str = "2000";

pub struct Harness {
    pub records: InMemoryRecordStore,
    pub directory: InMemoryDirectory,
    pub messenger: RecordingMessenger,
    pub clock: Arc<FixedClock>,
    pub services: Services,
}

pub fn config() -> Config {
    let vars = HashMap::from([
        ("DISCORD_TOKEN", "token"),
        ("DISCORD_APPLICATION_ID", BOT_USER),
        ("DISCORD_PUBLIC_KEY", "00"),
        ("DISCORD_GUILD_ID", "1000"),
        ("DISCORD_CHANNEL_REQUEST", REQUEST_CHANNEL),
        ("DISCORD_CHANNEL_ADMIN", ADMIN_CHANNEL),
        ("DISCORD_TICKET_CATEGORY", "4000"),
        ("DISCORD_ALLOWED_ROLES", STAFF_ROLE),
        ("DIRECTORY_BACKEND", "memory"),
        ("TICKET_CLOSE_DELAY_SECS", "5"),
    ]);
    Config::from_lookup(|name| vars.get(name).map(ToString::to_string)).expect("test config")
}

pub fn harness() -> Harness {
    harness_with(Vec::new())
}

pub fn harness_with(records: Vec<WhitelistRequest>) -> Harness {
    let records = InMemoryRecordStore::with_records(records);
    let directory = InMemoryDirectory::new();
    let messenger = RecordingMessenger::new();
    let clock = Arc::new(test_clock());
    let services = assemble(
        &config(),
        Arc::new(records.clone()),
        Arc::new(directory.clone()),
        Arc::new(messenger.clone()),
        clock.clone(),
    );
    Harness { records, directory, messenger, clock, services }
}

pub fn player(id: &str) -> Invoker {
    Invoker { id: UserId::new(id), tag: format!("user{id}"), roles: Vec::new() }
}

pub fn staff() -> Invoker {
    Invoker { id: UserId::new("900"), tag: "mod#0001".to_string(), roles: vec![RoleId::new(STAFF_ROLE)] }
}

pub fn admin_channel() -> ChannelId {
    ChannelId::new(ADMIN_CHANNEL)
}

/// Poll until `condition` holds; spawned notifications land asynchronously.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
