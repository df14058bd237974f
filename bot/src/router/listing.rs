//! Paged request list.

use crate::dispatcher::embeds::{format_time, status_emoji};
use crate::lifecycle::ListPage;
use crate::router::component::ComponentAction;
use std::fmt::Write as _;
use whitelist_core::messaging::{Button, ButtonStyle, Embed, OutboundMessage, colors};

/// Shown instead of an empty list
pub const EMPTY_LIST: &str = "📋 No whitelist requests found.";

/// Render one page with its navigation row.
#[must_use]
pub fn render(page: &ListPage) -> OutboundMessage {
    if page.total == 0 {
        return OutboundMessage::text(EMPTY_LIST);
    }

    let mut description = String::new();
    for (position, request) in &page.items {
        let _ = write!(
            description,
            "**{}.** {} **{}**\n└ Discord: {}\n└ Date: {}",
            position + 1,
            status_emoji(request.status),
            request.game_account,
            request.submitter_tag,
            format_time(request.requested_at),
        );
        if let Some(processed) = &request.processed {
            let _ = write!(description, "\n└ Processed by: {} at {}", processed.by, format_time(processed.at));
        }
        description.push_str("\n\n");
    }

    let embed = Embed::titled("📋 Whitelist Requests List")
        .description(description.trim_end())
        .color(colors::TICKET)
        .footer(format!("Page {}/{} • Total: {} requests", page.page + 1, page.total_pages, page.total));
    OutboundMessage::embed(embed).row(navigation(page))
}

fn navigation(page: &ListPage) -> Vec<Button> {
    let from = page.page;
    vec![
        Button::new(ComponentAction::ListPrevious { from }.custom_id(), "◀ Previous", ButtonStyle::Secondary)
            .disabled(!page.has_previous()),
        Button::new(
            ComponentAction::PageInfo.custom_id(),
            format!("Page {}/{}", from + 1, page.total_pages),
            ButtonStyle::Secondary,
        )
        .disabled(true),
        Button::new(ComponentAction::ListNext { from }.custom_id(), "Next ▶", ButtonStyle::Secondary)
            .disabled(!page.has_next()),
    ]
}
