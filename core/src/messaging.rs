//! Messaging gateway abstraction.
//!
//! Outbound: messages with embeds and buttons, edits, channel creation with
//! permission overrides, delayed channel deletion and direct messages.
//! Inbound: slash commands, button presses and modal submissions, already
//! decoded from the gateway's wire format into [`InboundEvent`].

use crate::request::{ChannelId, GuildId, MessageId, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Outbound payloads
// ============================================================================

/// Embed colours used by the bot
pub mod colors {
    /// Blue, informational
    pub const INFO: u32 = 0x0058_65F2;
    /// Orange, awaiting review
    pub const PENDING: u32 = 0x00FF_A500;
    /// Green
    pub const SUCCESS: u32 = 0x0057_F287;
    /// Red
    pub const DANGER: u32 = 0x00ED_4245;
    /// Purple, ticket
    pub const TICKET: u32 = 0x009B_59B6;
}

/// One name/value field of an embed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    /// Field title
    pub name: String,
    /// Field body
    pub value: String,
    /// Render next to neighbouring inline fields
    pub inline: bool,
}

/// Rich embed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Title line
    pub title: Option<String>,
    /// Body text
    pub description: Option<String>,
    /// Side bar colour
    pub color: Option<u32>,
    /// Fields in order
    pub fields: Vec<EmbedField>,
    /// Footer text
    pub footer: Option<String>,
    /// Timestamp shown next to the footer
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    /// Embed with a title
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    /// Set the description
    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set the colour
    #[must_use]
    pub const fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    /// Append a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField { name: name.into(), value: value.into(), inline });
        self
    }

    /// Set the footer
    #[must_use]
    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }

    /// Set the timestamp
    #[must_use]
    pub const fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// Visual style of a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonStyle {
    /// Blurple
    Primary,
    /// Grey
    Secondary,
    /// Green
    Success,
    /// Red
    Danger,
}

/// Interactive button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Identifier echoed back when pressed
    pub custom_id: String,
    /// Caption
    pub label: String,
    /// Style
    pub style: ButtonStyle,
    /// Greyed out
    pub disabled: bool,
}

impl Button {
    /// Enabled button
    #[must_use]
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self { custom_id: custom_id.into(), label: label.into(), style, disabled: false }
    }

    /// Set the disabled flag
    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// A message to send or an edit to apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Plain text
    pub content: Option<String>,
    /// Embeds
    pub embeds: Vec<Embed>,
    /// Rows of buttons; an empty list on an edit removes existing buttons
    pub components: Vec<Vec<Button>>,
    /// Only visible to the invoking user (interaction replies only)
    pub ephemeral: bool,
}

impl OutboundMessage {
    /// Plain text message
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }

    /// Message with a single embed
    #[must_use]
    pub fn embed(embed: Embed) -> Self {
        Self { embeds: vec![embed], ..Self::default() }
    }

    /// Add a row of buttons
    #[must_use]
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.components.push(buttons);
        self
    }

    /// Mark as ephemeral
    #[must_use]
    pub const fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// Text input inside a modal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    /// Identifier of the submitted value
    pub custom_id: String,
    /// Label above the input
    pub label: String,
    /// Placeholder text
    pub placeholder: Option<String>,
    /// Minimum length
    pub min_length: u16,
    /// Maximum length
    pub max_length: u16,
    /// Must be filled
    pub required: bool,
}

/// Pop-up form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modal {
    /// Identifier echoed back on submit
    pub custom_id: String,
    /// Window title
    pub title: String,
    /// Inputs, one per row
    pub inputs: Vec<TextInput>,
}

/// Discord permission bits used for ticket channels
pub mod permissions {
    /// Manage the channel
    pub const MANAGE_CHANNELS: u64 = 1 << 4;
    /// See the channel
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    /// Post in the channel
    pub const SEND_MESSAGES: u64 = 1 << 11;
    /// Read earlier messages
    pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
}

/// Subject of a permission override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverwriteTarget {
    /// A role (the guild id doubles as `@everyone`)
    Role(RoleId),
    /// A single member
    Member(UserId),
}

/// Per-role or per-member channel permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    /// Who the override applies to
    pub target: OverwriteTarget,
    /// Granted bits
    pub allow: u64,
    /// Revoked bits
    pub deny: u64,
}

/// A text channel to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Guild to create it in
    pub guild: GuildId,
    /// Channel name
    pub name: String,
    /// Parent category
    pub parent: Option<ChannelId>,
    /// Visibility overrides
    pub overwrites: Vec<PermissionOverwrite>,
}

/// A message read back from a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    /// Message id
    pub id: MessageId,
    /// Author id
    pub author: UserId,
    /// Title of the first embed, if any
    pub embed_title: Option<String>,
}

/// Errors from the messaging gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// The request never reached the gateway.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The gateway refused the request.
    #[error("Gateway rejected request ({status}): {body}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// The gateway answered with an unexpected payload.
    #[error("Unexpected gateway response: {0}")]
    Decode(String),
}

/// Boxed future returned by [`Messenger`] methods
pub type MessagingFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MessagingError>> + Send + 'a>>;

/// Outbound operations on the messaging gateway.
pub trait Messenger: Send + Sync {
    /// Post a message; returns its id.
    fn send_message(&self, channel: ChannelId, message: OutboundMessage) -> MessagingFuture<'_, MessageId>;

    /// Replace the content, embeds and buttons of an existing message.
    fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        edit: OutboundMessage,
    ) -> MessagingFuture<'_, ()>;

    /// Delete a channel after `delay`. Returns once the deletion is scheduled.
    fn delete_channel(&self, channel: ChannelId, delay: Duration) -> MessagingFuture<'_, ()>;

    /// Create a text channel; returns its id.
    fn create_channel(&self, spec: ChannelSpec) -> MessagingFuture<'_, ChannelId>;

    /// Open (or reuse) the direct-message channel with a user.
    fn open_direct_message(&self, user: UserId) -> MessagingFuture<'_, ChannelId>;

    /// The latest `limit` messages of a channel, newest first.
    fn recent_messages(&self, channel: ChannelId, limit: u8) -> MessagingFuture<'_, Vec<PostedMessage>>;
}

// ============================================================================
// Inbound events
// ============================================================================

/// The user behind an inbound event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoker {
    /// User id
    pub id: UserId,
    /// Display tag
    pub tag: String,
    /// Guild roles (empty in DMs)
    pub roles: Vec<RoleId>,
}

/// Where a button was pressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Channel of the message
    pub channel: ChannelId,
    /// The message carrying the button
    pub message: Option<MessageId>,
}

/// An inbound gateway event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundEvent {
    /// Slash command invoked
    SlashCommand {
        /// Who invoked it
        invoker: Invoker,
        /// Channel it was invoked in
        channel: ChannelId,
        /// Command name
        name: String,
        /// String options by name
        options: Vec<(String, String)>,
    },
    /// Button pressed
    Button {
        /// Who pressed it
        invoker: Invoker,
        /// Where
        origin: Origin,
        /// The button's custom id
        custom_id: String,
    },
    /// Modal submitted
    ModalSubmit {
        /// Who submitted it
        invoker: Invoker,
        /// Channel the modal was opened from
        channel: ChannelId,
        /// The modal's custom id
        custom_id: String,
        /// Submitted values by input id
        fields: Vec<(String, String)>,
    },
}

impl InboundEvent {
    /// The user behind the event
    #[must_use]
    pub const fn invoker(&self) -> &Invoker {
        match self {
            Self::SlashCommand { invoker, .. }
            | Self::Button { invoker, .. }
            | Self::ModalSubmit { invoker, .. } => invoker,
        }
    }
}

/// Look up a named value in an option or field list
#[must_use]
pub fn find_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// The immediate answer to an inbound event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionReply {
    /// Post a new reply message
    Message(OutboundMessage),
    /// Rewrite the message the button belongs to
    UpdateMessage(OutboundMessage),
    /// Open a modal
    Modal(Modal),
}

impl InteractionReply {
    /// Ephemeral plain-text reply
    #[must_use]
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self::Message(OutboundMessage::text(text).ephemeral())
    }
}

/// Boxed future returned by [`InteractionHandler::handle`]
pub type ReplyFuture<'a> = Pin<Box<dyn Future<Output = InteractionReply> + Send + 'a>>;

/// Consumer of inbound events. Always answers; failures become reply text.
pub trait InteractionHandler: Send + Sync {
    /// Handle one event
    fn handle(&self, event: InboundEvent) -> ReplyFuture<'_>;
}
