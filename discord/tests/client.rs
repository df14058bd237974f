//! REST client tests against a mock Discord API.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use serde_json::json;
use std::time::Duration;
use whitelist_core::messaging::{
    ChannelSpec, Embed, Messenger, MessagingError, OutboundMessage, OverwriteTarget,
    PermissionOverwrite, permissions,
};
use whitelist_core::request::{ChannelId, GuildId, MessageId, RoleId, UserId};
use whitelist_discord::{CommandDefinition, DiscordClient};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> (MockServer, DiscordClient) {
    let server = MockServer::start().await;
    let client = DiscordClient::with_base("secret", server.uri());
    (server, client)
}

#[tokio::test]
async fn send_message_posts_with_bot_authorization() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/channels/10/messages"))
        .and(header("Authorization", "Bot secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "555"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = client
        .send_message(ChannelId::new("10"), OutboundMessage::embed(Embed::titled("Hello")))
        .await
        .unwrap();
    assert_eq!(id, MessageId::new("555"));
}

#[tokio::test]
async fn refused_requests_surface_status_and_body() {
    let (server, client) = setup().await;
    Mock::given(method("PATCH"))
        .and(path("/channels/10/messages/20"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Unknown Message"))
        .mount(&server)
        .await;

    let result = client
        .edit_message(ChannelId::new("10"), MessageId::new("20"), OutboundMessage::text("x"))
        .await;
    assert_eq!(
        result,
        Err(MessagingError::Rejected { status: 404, body: "Unknown Message".to_string() })
    );
}

#[tokio::test]
async fn create_channel_sends_overwrites() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/guilds/1/channels"))
        .and(body_json(json!({
            "name": "ticket-steve",
            "type": 0,
            "parent_id": "300",
            "permission_overwrites": [
                {"id": "1", "type": 0, "allow": "0", "deny": "1024"},
                {"id": "42", "type": 1, "allow": "68608", "deny": "0"}
            ]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "900"})))
        .expect(1)
        .mount(&server)
        .await;

    let member_bits =
        permissions::VIEW_CHANNEL | permissions::SEND_MESSAGES | permissions::READ_MESSAGE_HISTORY;
    let spec = ChannelSpec {
        guild: GuildId::new("1"),
        name: "ticket-steve".into(),
        parent: Some(ChannelId::new("300")),
        overwrites: vec![
            PermissionOverwrite {
                target: OverwriteTarget::Role(RoleId::new("1")),
                allow: 0,
                deny: permissions::VIEW_CHANNEL,
            },
            PermissionOverwrite {
                target: OverwriteTarget::Member(UserId::new("42")),
                allow: member_bits,
                deny: 0,
            },
        ],
    };

    assert_eq!(client.create_channel(spec).await.unwrap(), ChannelId::new("900"));
}

#[tokio::test]
async fn recent_messages_reads_embed_titles() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/channels/10/messages"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "2", "author": {"id": "bot"}, "embeds": [{"title": "Whitelist Request"}]},
            {"id": "1", "author": {"id": "42"}, "embeds": []}
        ])))
        .mount(&server)
        .await;

    let messages = client.recent_messages(ChannelId::new("10"), 20).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].embed_title.as_deref(), Some("Whitelist Request"));
    assert_eq!(messages[1].embed_title, None);
}

#[tokio::test]
async fn direct_message_channel_is_opened() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/users/@me/channels"))
        .and(body_json(json!({"recipient_id": "42"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "dm-1"})))
        .mount(&server)
        .await;

    let channel = client.open_direct_message(UserId::new("42")).await.unwrap();
    assert_eq!(channel, ChannelId::new("dm-1"));
}

#[tokio::test]
async fn channel_deletion_happens_after_the_delay() {
    let (server, client) = setup().await;
    Mock::given(method("DELETE"))
        .and(path("/channels/900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "900"})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete_channel(ChannelId::new("900"), Duration::from_millis(20))
        .await
        .unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn commands_are_bulk_overwritten() {
    let (server, client) = setup().await;
    Mock::given(method("PUT"))
        .and(path("/applications/app/guilds/1/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let commands = vec![
        CommandDefinition::new("whitelist-list", "List whitelist requests"),
        CommandDefinition::new("whitelist-lookup", "Look up a request").string_option(
            "username",
            "Minecraft username",
            true,
        ),
    ];
    client.register_commands("app", &GuildId::new("1"), &commands).await.unwrap();
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let client = DiscordClient::with_base("secret", "http://127.0.0.1:1");
    let result = client.send_message(ChannelId::new("1"), OutboundMessage::text("x")).await;
    assert!(matches!(result, Err(MessagingError::Transport(_))));
}
