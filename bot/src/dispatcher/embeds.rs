//! Message builders.
//!
//! Pure functions from records to outbound messages; nothing here talks to
//! the gateway.

use crate::router::component::ComponentAction;
use chrono::{DateTime, Utc};
use std::time::Duration;
use whitelist_core::messaging::{Button, ButtonStyle, Embed, OutboundMessage, colors};
use whitelist_core::request::{Decision, GameAccount, RequestStatus, RoleId, UserId, WhitelistRequest};

/// Title of the request panel; also how an existing panel is recognised
pub const PANEL_TITLE: &str = "🎮 Minecraft Whitelist Request";

const FOOTER: &str = "Whitelist Bot";
const STATUS_FIELD: &str = "📊 Status";

/// `MM/dd/yyyy HH:mm`
#[must_use]
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%m/%d/%Y %H:%M").to_string()
}

/// Coloured dot for a status
#[must_use]
pub const fn status_emoji(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Approved => "🟢",
        RequestStatus::Denied => "🔴",
        RequestStatus::Ticket => "🔵",
        RequestStatus::Pending => "🟠",
    }
}

const fn status_color(status: RequestStatus) -> u32 {
    match status {
        RequestStatus::Approved => colors::SUCCESS,
        RequestStatus::Denied => colors::DANGER,
        RequestStatus::Ticket => colors::TICKET,
        RequestStatus::Pending => colors::PENDING,
    }
}

fn profile_link(record: &WhitelistRequest) -> String {
    format!("[View Profile]({})", record.profile_url())
}

/// The panel with the "Request Whitelist" button.
#[must_use]
pub fn request_panel() -> OutboundMessage {
    let embed = Embed::titled(PANEL_TITLE)
        .description("Click the button below to request access to our Minecraft server!")
        .color(colors::INFO)
        .footer(FOOTER);
    OutboundMessage::embed(embed).row(vec![Button::new(
        ComponentAction::RequestWhitelist.custom_id(),
        "Request Whitelist",
        ButtonStyle::Primary,
    )])
}

/// Ephemeral prompt asking the submitter to check their account.
#[must_use]
pub fn verification(account: &GameAccount) -> OutboundMessage {
    let embed = Embed::titled("🔍 Verification")
        .description(format!(
            "**Minecraft Username:** {account}\n\n\
             **NameMC Profile:** [Click here](https://namemc.com/profile/{account})\n\n\
             Please verify that the information is correct before confirming your request."
        ))
        .color(colors::PENDING)
        .footer("Check your NameMC profile");
    let mut message = OutboundMessage::embed(embed)
        .row(vec![
            Button::new(ComponentAction::ConfirmRequest.custom_id(), "✅ Confirm Request", ButtonStyle::Success),
            Button::new(ComponentAction::CancelRequest.custom_id(), "❌ Cancel", ButtonStyle::Danger),
        ])
        .ephemeral();
    message.content = Some("Verifying your request:".to_string());
    message
}

fn review_embed(record: &WhitelistRequest, roles: Option<&[RoleId]>) -> Embed {
    let mut embed = Embed::titled("📋 New Whitelist Request")
        .field("🎮 Minecraft Username", record.game_account.as_str(), true)
        .field("👤 Discord User", record.submitter_tag.as_str(), true);
    if let Some(roles) = roles {
        let listed = if roles.is_empty() {
            "None".to_string()
        } else {
            roles.iter().map(RoleId::mention).collect::<Vec<_>>().join(", ")
        };
        embed = embed.field("🏷️ Discord Roles", listed, true);
    }
    embed
        .field("🕐 Request Time", format_time(record.requested_at), true)
        .field("🔗 NameMC Profile", profile_link(record), true)
}

/// Staff review message with Approve, Deny and Create Ticket buttons.
#[must_use]
pub fn review(record: &WhitelistRequest, roles: &[RoleId]) -> OutboundMessage {
    let embed = review_embed(record, Some(roles))
        .field(STATUS_FIELD, format!("{} Pending", status_emoji(RequestStatus::Pending)), true)
        .color(colors::PENDING)
        .footer("Awaiting admin review");
    let button = |decision: Decision, label: &str, style: ButtonStyle| {
        let submitter = record.submitter_id.clone();
        Button::new(ComponentAction::Admin { decision, submitter }.custom_id(), label, style)
    };
    OutboundMessage::embed(embed).row(vec![
        button(Decision::Approve, "✅ Approve", ButtonStyle::Success),
        button(Decision::Deny, "❌ Deny", ButtonStyle::Danger),
        button(Decision::Escalate, "🎫 Create Ticket", ButtonStyle::Primary),
    ])
}

/// Replacement for a review message once a decision is committed.
///
/// Roles are not re-fetched, so that field is dropped; the buttons are removed.
#[must_use]
pub fn processed_review(record: &WhitelistRequest) -> OutboundMessage {
    let status = record.status;
    let mut embed = review_embed(record, None)
        .field(STATUS_FIELD, format!("{} {}", status_emoji(status), status.label()), true)
        .color(status_color(status));
    if let Some(processed) = &record.processed {
        embed = embed.footer(format!("Processed by {} • {}", processed.by, format_time(processed.at)));
    }
    OutboundMessage { components: Vec::new(), ..OutboundMessage::embed(embed) }
}

/// Direct message telling the submitter what was decided.
#[must_use]
pub fn decision_notice(record: &WhitelistRequest, decision: Decision) -> OutboundMessage {
    let (staff, at) = record
        .processed
        .as_ref()
        .map_or(("staff", record.requested_at), |p| (p.by.as_str(), p.at));
    let account = &record.game_account;
    let date = format_time(at);
    let text = match decision {
        Decision::Approve => format!(
            "🎉 **Great news!** Your whitelist request has been **approved**!\n\n\
             **Minecraft Username:** {account}\n**Approved by:** {staff}\n**Date:** {date}\n\n\
             You can now join our Minecraft server! Welcome aboard! 🎮"
        ),
        Decision::Deny => format!(
            "😔 **We're sorry to inform you** that your whitelist request has been **denied**.\n\n\
             **Minecraft Username:** {account}\n**Denied by:** {staff}\n**Date:** {date}\n\n\
             If you have questions, please contact our staff team."
        ),
        Decision::Escalate => format!(
            "🎫 **Your whitelist request requires additional review.**\n\n\
             **Minecraft Username:** {account}\n**Staff Member:** {staff}\n**Date:** {date}\n\n\
             A ticket channel has been created for discussion. You will be mentioned in the channel."
        ),
    };
    let embed = Embed::titled("📋 Whitelist Request Update")
        .description(text)
        .color(status_color(record.status))
        .footer(FOOTER);
    OutboundMessage::embed(embed)
}

/// Direct message to a removed player.
#[must_use]
pub fn removal_notice(record: &WhitelistRequest, staff: &str, at: DateTime<Utc>) -> OutboundMessage {
    let embed = Embed::titled("🚫 Whitelist Removal Notice")
        .description(format!(
            "**Your whitelist access has been removed.**\n\n\
             **Minecraft Username:** {}\n**Removed by:** {staff}\n**Date:** {}\n\n\
             If you believe this was done in error, please contact our staff team.",
            record.game_account,
            format_time(at)
        ))
        .color(colors::DANGER)
        .footer(FOOTER);
    OutboundMessage::embed(embed)
}

/// Confirmation shown to the staff member who removed a player.
#[must_use]
pub fn removal_summary(record: &WhitelistRequest, staff: &str, at: DateTime<Utc>) -> OutboundMessage {
    let embed = Embed::titled("✅ Player Removed Successfully")
        .description(format!(
            "**Minecraft Username:** {}\n**Discord User:** {}\n**Original Request Date:** {}\n\
             **Removed by:** {staff}\n**Removal Date:** {}",
            record.game_account,
            record.submitter_tag,
            format_time(record.requested_at),
            format_time(at)
        ))
        .color(colors::DANGER)
        .footer(FOOTER);
    OutboundMessage::embed(embed)
}

/// Opening message of a ticket channel.
#[must_use]
pub fn ticket_welcome(record: &WhitelistRequest, staff: &str) -> OutboundMessage {
    let embed = Embed::titled("🎫 Whitelist Request Ticket")
        .description(
            "**Welcome to your whitelist discussion ticket!**\n\n\
             This ticket was created to discuss your whitelist request in detail.",
        )
        .field("🎮 Minecraft Username", record.game_account.as_str(), true)
        .field("👤 Discord User", record.submitter_id.mention(), true)
        .field("⏰ Request Date", format_time(record.requested_at), true)
        .field("👨‍💼 Ticket Created By", staff, true)
        .field("🔗 NameMC Profile", profile_link(record), true)
        .field("📊 Current Status", "🔵 Under Review", true)
        .color(colors::TICKET)
        .footer("Use the button below to close this ticket");
    let mut message = OutboundMessage::embed(embed).row(vec![Button::new(
        ComponentAction::CloseTicket.custom_id(),
        "🗑️ Close Ticket",
        ButtonStyle::Danger,
    )]);
    message.content = Some(record.submitter_id.mention());
    message
}

/// Public prompt asking whether to really close a ticket.
#[must_use]
pub fn close_confirmation() -> OutboundMessage {
    let embed = Embed::titled("🚨 Confirm Ticket Closure")
        .description(
            "Are you sure you want to close this ticket?\n\n\
             **This action cannot be undone and the channel will be deleted.**",
        )
        .color(colors::DANGER)
        .footer("Ticket Closure Confirmation");
    OutboundMessage::embed(embed).row(vec![
        Button::new(ComponentAction::ConfirmCloseTicket.custom_id(), "✅ Yes, Close Ticket", ButtonStyle::Danger),
        Button::new(ComponentAction::CancelCloseTicket.custom_id(), "❌ Cancel", ButtonStyle::Secondary),
    ])
}

/// Final message in a closed ticket.
#[must_use]
pub fn ticket_closed(closed_by: &UserId, delay: Duration, at: DateTime<Utc>) -> OutboundMessage {
    let embed = Embed::titled("🗑️ Ticket Closed")
        .description(format!(
            "This ticket has been closed by {}\n\n**Channel will be deleted in {} seconds.**",
            closed_by.mention(),
            delay.as_secs()
        ))
        .color(colors::DANGER)
        .timestamp(at)
        .footer(FOOTER);
    OutboundMessage::embed(embed)
}

/// Plain-text record snapshot, for the lookup command and the CLI.
#[must_use]
pub fn lookup_snapshot(record: &WhitelistRequest) -> String {
    let mut lines = vec![
        format!("Minecraft username: {}", record.game_account),
        format!("Discord user: {} ({})", record.submitter_tag, record.submitter_id),
        format!("Request date: {}", format_time(record.requested_at)),
        format!("Status: {}", record.status.label()),
    ];
    if let Some(processed) = &record.processed {
        lines.push(format!("Processed by: {}", processed.by));
        lines.push(format!("Processing date: {}", format_time(processed.at)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;
    use whitelist_testing::{fixtures, test_clock};
    use whitelist_core::environment::Clock;

    #[test]
    fn review_carries_the_three_admin_buttons() {
        let record = fixtures::request("42", "Steve", RequestStatus::Pending);
        let message = review(&record, &[RoleId::new("7")]);

        let ids: Vec<_> = message.components[0].iter().map(|b| b.custom_id.as_str()).collect();
        assert_eq!(ids, ["admin_approve_42", "admin_deny_42", "admin_ticket_42"]);

        let embed = &message.embeds[0];
        assert_eq!(embed.color, Some(colors::PENDING));
        assert!(embed.fields.iter().any(|f| f.name == "🏷️ Discord Roles" && f.value == "<@&7>"));
        assert!(embed.fields.iter().any(|f| f.value == "[View Profile](https://namemc.com/profile/Steve)"));
        assert!(embed.fields.iter().any(|f| f.value == "01/01/2025 00:00"));
    }

    #[test]
    fn review_without_roles_says_none() {
        let record = fixtures::request("42", "Steve", RequestStatus::Pending);
        let message = review(&record, &[]);
        assert!(message.embeds[0].fields.iter().any(|f| f.name == "🏷️ Discord Roles" && f.value == "None"));
    }

    #[test]
    fn processed_review_drops_buttons_and_stamps_footer() {
        let record = fixtures::request("42", "Steve", RequestStatus::Approved);
        let message = processed_review(&record);

        assert!(message.components.is_empty());
        let embed = &message.embeds[0];
        assert_eq!(embed.color, Some(colors::SUCCESS));
        assert_eq!(embed.footer.as_deref(), Some("Processed by staff#0001 • 01/01/2025 00:00"));
        let status = embed.fields.iter().find(|f| f.name == STATUS_FIELD).unwrap();
        assert_eq!(status.value, "🟢 ✅ APPROVED");
    }

    #[test]
    fn decision_notice_names_the_staff_member() {
        let record = fixtures::request("42", "Steve", RequestStatus::Denied);
        let message = decision_notice(&record, Decision::Deny);
        let text = message.embeds[0].description.as_deref().unwrap();
        assert!(text.contains("**denied**"));
        assert!(text.contains("**Denied by:** staff#0001"));
        assert_eq!(message.embeds[0].color, Some(colors::DANGER));
    }

    #[test]
    fn ticket_welcome_mentions_the_submitter() {
        let record = fixtures::request("42", "Steve", RequestStatus::Ticket);
        let message = ticket_welcome(&record, "mod#0001");
        assert_eq!(message.content.as_deref(), Some("<@42>"));
        assert_eq!(message.components[0][0].custom_id, "close_ticket");
    }

    #[test]
    fn ticket_closed_states_the_delay() {
        let message = ticket_closed(&UserId::new("9"), Duration::from_secs(5), test_clock().now());
        let text = message.embeds[0].description.as_deref().unwrap();
        assert!(text.starts_with("This ticket has been closed by <@9>"));
        assert!(text.ends_with("**Channel will be deleted in 5 seconds.**"));
    }

    #[test]
    fn snapshot_lists_processing_only_when_processed() {
        let pending = lookup_snapshot(&fixtures::request("1", "Steve", RequestStatus::Pending));
        assert!(!pending.contains("Processed by"));
        let approved = lookup_snapshot(&fixtures::request("1", "Steve", RequestStatus::Approved));
        assert!(approved.contains("Processed by: staff#0001"));
        assert!(approved.contains("Discord user: user1 (1)"));
    }
}
