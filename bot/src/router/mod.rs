//! Interaction router.
//!
//! Maps inbound slash commands, button presses and modal submits onto
//! lifecycle engine calls and turns the results into interaction replies.
//! Follow-up traffic (staff announcements, DMs, channel deletion) is handed
//! to the dispatcher on spawned tasks so the reply is never held up by it.
//!
//! # Permissions
//!
//! Staff means holding at least one configured role. With no roles
//! configured nobody is staff. A ticket can also be closed by its submitter.

pub mod component;
pub mod listing;

pub use component::{ComponentAction, SlashCommand, command_definitions};

use crate::dispatcher::{Dispatcher, embeds};
use crate::lifecycle::{DecisionOutcome, LifecycleEngine, LifecycleError, RemovalOutcome};
use component::{USERNAME_INPUT, WHITELIST_MODAL, whitelist_modal};
use std::sync::Arc;
use std::time::Duration;
use whitelist_core::environment::Clock;
use whitelist_core::messaging::{
    InboundEvent, InteractionHandler, InteractionReply, Invoker, Origin, ReplyFuture, find_value,
};
use whitelist_core::request::{ChannelId, Decision, GameAccount, RoleId, UserId};

/// Default delay between closing a ticket and deleting its channel
pub const DEFAULT_TICKET_CLOSE_DELAY: Duration = Duration::from_secs(5);

const NO_COMMAND_PERMISSION: &str = "❌ You don't have permission to use this command.";
const NO_ACTION_PERMISSION: &str = "❌ You don't have permission to perform this action.";
const NO_TICKET_PERMISSION: &str = "❌ You don't have permission to close this ticket.";
const UNKNOWN_INTERACTION: &str = "❌ This interaction is not recognised.";

/// User-facing text for a lifecycle error.
#[must_use]
pub fn error_message(error: &LifecycleError) -> String {
    match error {
        LifecycleError::NotFound => "❌ Request not found.".to_string(),
        LifecycleError::AlreadyPending => {
            "⏳ You already have a pending whitelist request. Please wait for admin review.".to_string()
        },
        LifecycleError::AlreadyApproved => {
            "✅ You are already whitelisted on our server! No need to request again.".to_string()
        },
        LifecycleError::NameAlreadyClaimed => {
            "❌ This Minecraft username is already whitelisted by another Discord user!".to_string()
        },
        LifecycleError::InvalidTransition(_) => "⚠️ This request has already been handled.".to_string(),
        LifecycleError::PermissionDenied => NO_ACTION_PERMISSION.to_string(),
        LifecycleError::StoreUnavailable(_) => "❌ Error processing your request. Please try again.".to_string(),
        LifecycleError::DirectoryUpdateFailed(account) => format!(
            "⚠️ The server whitelist could not be updated for `{account}`. Please fix it manually."
        ),
        LifecycleError::TicketAlreadyOpen(channel) => {
            format!("❌ A ticket channel already exists for this user: {}", channel.mention())
        },
    }
}

fn rejected(error: &LifecycleError) -> InteractionReply {
    match error {
        LifecycleError::StoreUnavailable(_) => tracing::warn!(%error, "Interaction failed"),
        _ => tracing::debug!(%error, "Interaction rejected"),
    }
    InteractionReply::ephemeral(error_message(error))
}

/// Staff-facing reply for a committed decision
fn decision_reply(outcome: &DecisionOutcome) -> String {
    let mut text = match outcome.decision {
        Decision::Approve => "✅ Request approved! Player added to whitelist.".to_string(),
        Decision::Deny => "❌ Request denied.".to_string(),
        Decision::Escalate if outcome.ticket.is_some() => "🎫 Ticket channel created successfully.".to_string(),
        Decision::Escalate => "🎫 Request moved to ticket, but the ticket channel could not be created.".to_string(),
    };
    if let Some(partial) = outcome.partial_failure() {
        text.push('\n');
        text.push_str(&error_message(&partial));
    }
    text
}

/// [`InteractionHandler`] for the whitelist bot.
pub struct InteractionRouter {
    engine: LifecycleEngine,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    staff_roles: Vec<RoleId>,
    ticket_close_delay: Duration,
}

impl InteractionRouter {
    /// Route over `engine`, with staff roles taken from the dispatcher's layout.
    #[must_use]
    pub fn new(engine: LifecycleEngine, dispatcher: Arc<Dispatcher>, clock: Arc<dyn Clock>) -> Self {
        let staff_roles = dispatcher.layout().staff_roles.clone();
        Self { engine, dispatcher, clock, staff_roles, ticket_close_delay: DEFAULT_TICKET_CLOSE_DELAY }
    }

    /// Override the ticket channel deletion delay.
    #[must_use]
    pub const fn with_ticket_close_delay(mut self, delay: Duration) -> Self {
        self.ticket_close_delay = delay;
        self
    }

    fn is_staff(&self, invoker: &Invoker) -> bool {
        invoker.roles.iter().any(|role| self.staff_roles.contains(role))
    }

    async fn may_close_ticket(&self, invoker: &Invoker, channel: &ChannelId) -> bool {
        self.is_staff(invoker) || self.engine.ticket_owner(channel).await.as_ref() == Some(&invoker.id)
    }

    /// Route one event to its handler.
    pub async fn route(&self, event: InboundEvent) -> InteractionReply {
        match event {
            InboundEvent::SlashCommand { invoker, name, options, .. } => {
                metrics::counter!("interactions.received", "kind" => "command").increment(1);
                match SlashCommand::parse(&name, &options) {
                    Some(command) => self.on_command(&invoker, command).await,
                    None => {
                        tracing::warn!(command = %name, "Unknown slash command");
                        InteractionReply::ephemeral(UNKNOWN_INTERACTION)
                    },
                }
            },
            InboundEvent::Button { invoker, origin, custom_id } => {
                metrics::counter!("interactions.received", "kind" => "button").increment(1);
                match ComponentAction::parse(&custom_id) {
                    Some(action) => self.on_button(&invoker, origin, action).await,
                    None => {
                        tracing::warn!(%custom_id, "Unknown button");
                        InteractionReply::ephemeral(UNKNOWN_INTERACTION)
                    },
                }
            },
            InboundEvent::ModalSubmit { invoker, custom_id, fields, .. } => {
                metrics::counter!("interactions.received", "kind" => "modal").increment(1);
                if custom_id != WHITELIST_MODAL {
                    tracing::warn!(%custom_id, "Unknown modal");
                    return InteractionReply::ephemeral(UNKNOWN_INTERACTION);
                }
                self.on_request_form(&invoker, find_value(&fields, USERNAME_INPUT).unwrap_or_default())
                    .await
            },
        }
    }

    // ========== Slash commands ==========

    #[tracing::instrument(skip_all, fields(invoker = %invoker.id, command = command.name()))]
    async fn on_command(&self, invoker: &Invoker, command: SlashCommand) -> InteractionReply {
        if !self.is_staff(invoker) {
            return InteractionReply::ephemeral(NO_COMMAND_PERMISSION);
        }
        match command {
            SlashCommand::List => match self.engine.list_page(0).await {
                Ok(page) => InteractionReply::Message(listing::render(&page)),
                Err(error) => {
                    tracing::warn!(%error, "Could not list requests");
                    InteractionReply::ephemeral("❌ Error fetching data from database.")
                },
            },
            SlashCommand::Remove { username } => self.on_remove(invoker, &username).await,
            SlashCommand::Lookup { username } => match self.engine.lookup_by_account(&username).await {
                Ok(Some(record)) => InteractionReply::ephemeral(embeds::lookup_snapshot(&record)),
                Ok(None) => InteractionReply::ephemeral(not_in_database(&username)),
                Err(error) => rejected(&error),
            },
        }
    }

    async fn on_remove(&self, invoker: &Invoker, username: &str) -> InteractionReply {
        // Stored names predating validation must stay removable
        let account = GameAccount::from_stored(username.trim());
        match self.engine.remove(&account, &invoker.tag).await {
            Ok(outcome) => {
                let mut summary = embeds::removal_summary(&outcome.record, &invoker.tag, self.clock.now());
                summary.content = outcome.partial_failure().map(|partial| error_message(&partial));
                self.spawn_removal_notice(outcome, invoker.tag.clone());
                InteractionReply::Message(summary)
            },
            Err(LifecycleError::NotFound) => InteractionReply::ephemeral(not_in_database(username)),
            Err(error) => {
                tracing::warn!(%error, account = %account, "Removal failed");
                InteractionReply::ephemeral("❌ Error removing player from whitelist.")
            },
        }
    }

    // ========== Buttons ==========

    #[tracing::instrument(skip_all, fields(invoker = %invoker.id, action = ?action))]
    async fn on_button(&self, invoker: &Invoker, origin: Origin, action: ComponentAction) -> InteractionReply {
        match action {
            ComponentAction::RequestWhitelist => match self.engine.check_eligibility(&invoker.id).await {
                Ok(()) => InteractionReply::Modal(whitelist_modal()),
                Err(error) => rejected(&error),
            },
            ComponentAction::ConfirmRequest => match self.engine.confirm(&invoker.id).await {
                Ok(record) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let roles = invoker.roles.clone();
                    tokio::spawn(async move {
                        dispatcher.announce_request(&record, &roles).await;
                    });
                    InteractionReply::ephemeral("✅ Your whitelist request has been sent to administrators!")
                },
                Err(LifecycleError::NotFound) => InteractionReply::ephemeral("❌ Error: Request expired or not found."),
                Err(error) => rejected(&error),
            },
            ComponentAction::CancelRequest => {
                self.engine.cancel(&invoker.id).await;
                InteractionReply::ephemeral("❌ Request cancelled.")
            },
            ComponentAction::Admin { decision, submitter } => {
                self.on_decision(invoker, origin, decision, &submitter).await
            },
            ComponentAction::ListPrevious { from } => self.on_navigate(invoker, from.saturating_sub(1)).await,
            ComponentAction::ListNext { from } => self.on_navigate(invoker, from.saturating_add(1)).await,
            ComponentAction::PageInfo => InteractionReply::ephemeral("Use ◀ Previous and Next ▶ to change page."),
            ComponentAction::CloseTicket => {
                if !self.may_close_ticket(invoker, &origin.channel).await {
                    return InteractionReply::ephemeral(NO_TICKET_PERMISSION);
                }
                InteractionReply::Message(embeds::close_confirmation())
            },
            ComponentAction::CancelCloseTicket => {
                if !self.may_close_ticket(invoker, &origin.channel).await {
                    return InteractionReply::ephemeral("❌ You cannot cancel this ticket closure.");
                }
                InteractionReply::ephemeral("❌ Ticket closure cancelled.")
            },
            ComponentAction::ConfirmCloseTicket => self.on_close_ticket(invoker, origin.channel).await,
        }
    }

    async fn on_decision(
        &self,
        invoker: &Invoker,
        origin: Origin,
        decision: Decision,
        submitter: &UserId,
    ) -> InteractionReply {
        if !self.is_staff(invoker) {
            return rejected(&LifecycleError::PermissionDenied);
        }
        match self.engine.decide(submitter, decision, &invoker.tag).await {
            Ok(outcome) => {
                let reply = decision_reply(&outcome);
                let dispatcher = Arc::clone(&self.dispatcher);
                tokio::spawn(async move {
                    dispatcher.publish_decision(Some(&origin), &outcome).await;
                });
                InteractionReply::ephemeral(reply)
            },
            Err(error) => rejected(&error),
        }
    }

    async fn on_navigate(&self, invoker: &Invoker, page: usize) -> InteractionReply {
        if !self.is_staff(invoker) {
            return InteractionReply::ephemeral(NO_COMMAND_PERMISSION);
        }
        match self.engine.list_page(page).await {
            Ok(page) => InteractionReply::UpdateMessage(listing::render(&page)),
            Err(error) => {
                tracing::warn!(%error, "Could not page requests");
                InteractionReply::ephemeral("❌ Error updating list.")
            },
        }
    }

    async fn on_close_ticket(&self, invoker: &Invoker, channel: ChannelId) -> InteractionReply {
        if !self.may_close_ticket(invoker, &channel).await {
            return InteractionReply::ephemeral(NO_TICKET_PERMISSION);
        }
        match self.engine.close_ticket(&channel).await {
            Ok(Some(submitter)) => tracing::debug!(submitter = %submitter, closed_by = %invoker.id, "Ticket released"),
            Ok(None) => tracing::debug!(channel = %channel, "Closing an untracked ticket channel"),
            Err(error) => tracing::warn!(%error, "Ticket association not dropped"),
        }

        let delay = self.ticket_close_delay;
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.close_ticket_channel(&channel, delay).await;
        });
        InteractionReply::Message(embeds::ticket_closed(&invoker.id, delay, self.clock.now()))
    }

    // ========== Modal ==========

    #[tracing::instrument(skip_all, fields(invoker = %invoker.id))]
    async fn on_request_form(&self, invoker: &Invoker, username: &str) -> InteractionReply {
        let account = match GameAccount::parse(username) {
            Ok(account) => account,
            Err(error) => return InteractionReply::ephemeral(format!("❌ Invalid Minecraft username: {error}.")),
        };
        match self.engine.submit(&invoker.id, invoker.tag.clone(), account).await {
            Ok(draft) => InteractionReply::Message(embeds::verification(&draft.request.game_account)),
            Err(error) => rejected(&error),
        }
    }

    fn spawn_removal_notice(&self, outcome: RemovalOutcome, staff: String) {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.notify_removal(&outcome.record, &staff).await;
        });
    }
}

fn not_in_database(username: &str) -> String {
    format!("❌ Player `{username}` not found in whitelist database.")
}

impl InteractionHandler for InteractionRouter {
    fn handle(&self, event: InboundEvent) -> ReplyFuture<'_> {
        Box::pin(self.route(event))
    }
}
