//! Notification dispatcher.
//!
//! Turns lifecycle outcomes into gateway traffic: the staff review message,
//! decision and removal DMs, ticket channels and the request panel. Every
//! send is best effort. Transient failures are retried per the configured
//! [`RetryPolicy`]; what still fails is logged and counted, never returned,
//! because the state change it reports has already been committed.

pub mod embeds;

use crate::lifecycle::{DecisionOutcome, TicketDesk};
use std::sync::Arc;
use std::time::Duration;
use whitelist_core::environment::Clock;
use whitelist_core::messaging::{
    ChannelSpec, Messenger, MessagingError, MessagingFuture, Origin, OutboundMessage,
    OverwriteTarget, PermissionOverwrite, permissions,
};
use whitelist_core::request::{ChannelId, GuildId, MessageId, RoleId, UserId, WhitelistRequest};
use whitelist_runtime::retry::{RetryPolicy, retry_with_predicate};

/// How many recent messages are searched for an existing panel
const PANEL_SCAN_DEPTH: u8 = 20;

/// Where things get posted.
#[derive(Debug, Clone)]
pub struct ChannelLayout {
    /// Guild holding every channel below
    pub guild: GuildId,
    /// Channel with the request panel
    pub request_channel: ChannelId,
    /// Channel receiving staff review messages
    pub admin_channel: ChannelId,
    /// Category new ticket channels are created under
    pub ticket_category: Option<ChannelId>,
    /// Roles that count as staff
    pub staff_roles: Vec<RoleId>,
    /// The bot's own user id, to recognise its earlier messages
    pub bot_user: UserId,
}

/// Best-effort delivery of everything the bot says on its own initiative.
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    layout: ChannelLayout,
    retry: RetryPolicy,
}

/// Gateway errors worth another attempt: transport failures, rate limits
/// and server errors.
#[must_use]
pub const fn is_retryable(error: &MessagingError) -> bool {
    match error {
        MessagingError::Transport(_) => true,
        MessagingError::Rejected { status, .. } => *status == 429 || *status >= 500,
        MessagingError::Decode(_) => false,
    }
}

impl Dispatcher {
    /// Create a dispatcher with the default retry policy.
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>, clock: Arc<dyn Clock>, layout: ChannelLayout) -> Self {
        Self { messenger, clock, layout, retry: RetryPolicy::default() }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Channel layout in use
    #[must_use]
    pub const fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Run `operation` under the retry policy.
    async fn attempt<'m, T, F>(&self, operation: F) -> Result<T, MessagingError>
    where
        F: FnMut() -> MessagingFuture<'m, T>,
    {
        retry_with_predicate(self.retry.clone(), operation, is_retryable).await
    }

    /// [`Self::attempt`], logging and counting a final failure.
    async fn deliver<'m, T, F>(&self, kind: &'static str, operation: F) -> Option<T>
    where
        F: FnMut() -> MessagingFuture<'m, T>,
    {
        match self.attempt(operation).await {
            Ok(value) => Some(value),
            Err(error) => {
                metrics::counter!("notifications.failed", "kind" => kind).increment(1);
                tracing::warn!(kind, %error, "Notification not delivered");
                None
            },
        }
    }

    /// DM a user; `false` if it could not be delivered.
    async fn direct_message(&self, user: &UserId, kind: &'static str, message: OutboundMessage) -> bool {
        let Some(channel) = self.deliver(kind, || self.messenger.open_direct_message(user.clone())).await else {
            return false;
        };
        self.deliver(kind, || self.messenger.send_message(channel.clone(), message.clone()))
            .await
            .is_some()
    }

    /// Post the staff review message for a confirmed request.
    #[tracing::instrument(skip_all, fields(submitter = %record.submitter_id, account = %record.game_account))]
    pub async fn announce_request(&self, record: &WhitelistRequest, roles: &[RoleId]) -> Option<MessageId> {
        let message = embeds::review(record, roles);
        let channel = &self.layout.admin_channel;
        let id = self.deliver("announce", || self.messenger.send_message(channel.clone(), message.clone())).await;
        if id.is_some() {
            tracing::info!("Request announced to staff");
        }
        id
    }

    /// Reflect a committed decision: update the review message it came from
    /// and tell the submitter.
    #[tracing::instrument(skip_all, fields(submitter = %outcome.record.submitter_id, decision = %outcome.decision))]
    pub async fn publish_decision(&self, origin: Option<&Origin>, outcome: &DecisionOutcome) {
        let record = &outcome.record;
        if let Some(Origin { channel, message: Some(message) }) = origin {
            let edit = embeds::processed_review(record);
            let edited = self
                .messenger
                .edit_message(channel.clone(), message.clone(), edit)
                .await;
            if let Err(error) = edited {
                // The message may have been deleted or already replaced
                tracing::warn!(%error, account = %record.game_account, "Could not update review message");
            }
        }

        let notice = embeds::decision_notice(record, outcome.decision);
        if self.direct_message(&record.submitter_id, "decision", notice).await {
            tracing::debug!("Decision DM sent");
        }
    }

    /// Tell a removed player about it.
    #[tracing::instrument(skip_all, fields(submitter = %record.submitter_id, account = %record.game_account))]
    pub async fn notify_removal(&self, record: &WhitelistRequest, staff: &str) {
        let notice = embeds::removal_notice(record, staff, self.clock.now());
        if self.direct_message(&record.submitter_id, "removal", notice).await {
            tracing::debug!("Removal DM sent");
        }
    }

    /// Schedule deletion of a closed ticket channel.
    #[tracing::instrument(skip(self))]
    pub async fn close_ticket_channel(&self, channel: &ChannelId, delay: Duration) {
        let scheduled = self.deliver("ticket_delete", || self.messenger.delete_channel(channel.clone(), delay)).await;
        if scheduled.is_some() {
            tracing::info!("Ticket channel deletion scheduled");
        }
    }

    /// Post the request panel unless one of the bot's recent messages in the
    /// request channel already is one. Returns whether a panel was posted.
    ///
    /// # Errors
    ///
    /// Returns a [`MessagingError`] if the channel cannot be read or written.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_request_panel(&self) -> Result<bool, MessagingError> {
        let channel = &self.layout.request_channel;
        let recent = self
            .attempt(|| self.messenger.recent_messages(channel.clone(), PANEL_SCAN_DEPTH))
            .await?;
        let present = recent.iter().any(|m| {
            m.author == self.layout.bot_user
                && m.embed_title.as_deref().is_some_and(|t| t.contains("Whitelist Request"))
        });
        if present {
            tracing::info!("Request panel already present");
            return Ok(false);
        }

        let panel = embeds::request_panel();
        self.attempt(|| self.messenger.send_message(channel.clone(), panel.clone())).await?;
        tracing::info!("Request panel posted");
        Ok(true)
    }

    fn ticket_spec(&self, record: &WhitelistRequest) -> ChannelSpec {
        let member = permissions::VIEW_CHANNEL | permissions::SEND_MESSAGES | permissions::READ_MESSAGE_HISTORY;
        let mut overwrites = vec![
            // The guild id doubles as the @everyone role
            PermissionOverwrite {
                target: OverwriteTarget::Role(RoleId::new(self.layout.guild.as_str())),
                allow: 0,
                deny: permissions::VIEW_CHANNEL,
            },
            PermissionOverwrite {
                target: OverwriteTarget::Member(record.submitter_id.clone()),
                allow: member,
                deny: 0,
            },
        ];
        overwrites.extend(self.layout.staff_roles.iter().map(|role| PermissionOverwrite {
            target: OverwriteTarget::Role(role.clone()),
            allow: member | permissions::MANAGE_CHANNELS,
            deny: 0,
        }));
        ChannelSpec {
            guild: self.layout.guild.clone(),
            name: format!("ticket-{}", record.game_account.key()),
            parent: self.layout.ticket_category.clone(),
            overwrites,
        }
    }
}

impl TicketDesk for Dispatcher {
    fn open_ticket(&self, record: WhitelistRequest, staff: String) -> MessagingFuture<'_, ChannelId> {
        Box::pin(async move {
            let spec = self.ticket_spec(&record);
            let channel = self
                .attempt(|| self.messenger.create_channel(spec.clone()))
                .await
                .inspect_err(|error| {
                    metrics::counter!("notifications.failed", "kind" => "ticket_create").increment(1);
                    tracing::warn!(submitter = %record.submitter_id, %error, "Ticket channel not created");
                })?;
            tracing::info!(submitter = %record.submitter_id, channel = %channel, "Ticket channel created");

            let welcome = embeds::ticket_welcome(&record, &staff);
            self.deliver("ticket_welcome", || self.messenger.send_message(channel.clone(), welcome.clone()))
                .await;
            Ok(channel)
        })
    }
}
