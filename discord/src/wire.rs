//! Discord JSON payloads.
//!
//! Inbound interactions are deserialized into [`Interaction`] and decoded into
//! the gateway-neutral [`InboundEvent`]. Outbound messages, modals and
//! interaction callbacks are encoded from the core messaging types.

use crate::error::DiscordError;
use serde::{Deserialize, Serialize};
use whitelist_core::messaging::{
    Button, ButtonStyle, Embed, EmbedField, InboundEvent, InteractionReply, Invoker, Modal,
    OutboundMessage, Origin, OverwriteTarget, PermissionOverwrite,
};
use whitelist_core::request::{ChannelId, MessageId, RoleId, UserId};

/// Message flag hiding a reply from everyone but the invoker
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Interaction type codes
pub mod interaction_type {
    /// Endpoint liveness check
    pub const PING: u8 = 1;
    /// Slash command
    pub const APPLICATION_COMMAND: u8 = 2;
    /// Button press
    pub const MESSAGE_COMPONENT: u8 = 3;
    /// Modal submission
    pub const MODAL_SUBMIT: u8 = 5;
}

/// Interaction callback type codes
pub mod callback_type {
    /// Answer a PING
    pub const PONG: u8 = 1;
    /// Reply with a new message
    pub const CHANNEL_MESSAGE: u8 = 4;
    /// Rewrite the message the component belongs to
    pub const UPDATE_MESSAGE: u8 = 7;
    /// Open a modal
    pub const MODAL: u8 = 9;
}

// ============================================================================
// Inbound
// ============================================================================

/// Raw interaction as posted to the endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    /// Interaction type code
    #[serde(rename = "type")]
    pub kind: u8,
    /// Type-specific data
    #[serde(default)]
    pub data: Option<InteractionData>,
    /// Invoking member (guild interactions)
    #[serde(default)]
    pub member: Option<Member>,
    /// Invoking user (DM interactions)
    #[serde(default)]
    pub user: Option<User>,
    /// Channel of the interaction
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Message a component belongs to
    #[serde(default)]
    pub message: Option<MessageRef>,
}

/// Type-specific interaction data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    /// Command name
    #[serde(default)]
    pub name: Option<String>,
    /// Command options
    #[serde(default)]
    pub options: Vec<CommandOptionValue>,
    /// Component or modal id
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Modal rows
    #[serde(default)]
    pub components: Vec<SubmittedRow>,
}

/// One supplied command option
#[derive(Debug, Clone, Deserialize)]
pub struct CommandOptionValue {
    /// Option name
    pub name: String,
    /// Option value (string, number or boolean)
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// A row of a submitted modal
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedRow {
    /// Inputs in the row
    #[serde(default)]
    pub components: Vec<SubmittedInput>,
}

/// A submitted modal input
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedInput {
    /// Input id
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Entered text
    #[serde(default)]
    pub value: Option<String>,
}

/// Guild member
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    /// The user
    pub user: User,
    /// Role ids
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Discord user
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Snowflake
    pub id: String,
    /// Account name
    pub username: String,
    /// Legacy discriminator, `"0"` for migrated accounts
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl User {
    /// `name#1234` for legacy accounts, the bare name otherwise
    #[must_use]
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{d}", self.username),
            _ => self.username.clone(),
        }
    }
}

/// Reference to a message
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    /// Message id
    pub id: String,
}

/// Result of decoding an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Liveness check, answered with PONG
    Ping,
    /// Event for the interaction handler
    Event(InboundEvent),
}

impl Interaction {
    /// Decode into a gateway-neutral event.
    ///
    /// # Errors
    ///
    /// Returns [`DiscordError::MalformedPayload`] if required fields are
    /// missing and [`DiscordError::UnsupportedInteraction`] for other types.
    pub fn decode(self) -> Result<Decoded, DiscordError> {
        if self.kind == interaction_type::PING {
            return Ok(Decoded::Ping);
        }

        let invoker = self.invoker()?;
        let channel = ChannelId::new(
            self.channel_id
                .ok_or_else(|| DiscordError::MalformedPayload("missing channel_id".into()))?,
        );
        let data = self
            .data
            .ok_or_else(|| DiscordError::MalformedPayload("missing data".into()))?;

        let event = match self.kind {
            interaction_type::APPLICATION_COMMAND => InboundEvent::SlashCommand {
                invoker,
                channel,
                name: data
                    .name
                    .ok_or_else(|| DiscordError::MalformedPayload("missing command name".into()))?,
                options: data
                    .options
                    .into_iter()
                    .filter_map(|o| o.value.map(|v| (o.name, value_to_string(v))))
                    .collect(),
            },
            interaction_type::MESSAGE_COMPONENT => InboundEvent::Button {
                invoker,
                origin: Origin {
                    channel,
                    message: self.message.map(|m| MessageId::new(m.id)),
                },
                custom_id: data
                    .custom_id
                    .ok_or_else(|| DiscordError::MalformedPayload("missing custom_id".into()))?,
            },
            interaction_type::MODAL_SUBMIT => InboundEvent::ModalSubmit {
                invoker,
                channel,
                custom_id: data
                    .custom_id
                    .ok_or_else(|| DiscordError::MalformedPayload("missing custom_id".into()))?,
                fields: data
                    .components
                    .into_iter()
                    .flat_map(|row| row.components)
                    .filter_map(|input| Some((input.custom_id?, input.value.unwrap_or_default())))
                    .collect(),
            },
            other => return Err(DiscordError::UnsupportedInteraction(other)),
        };
        Ok(Decoded::Event(event))
    }

    fn invoker(&self) -> Result<Invoker, DiscordError> {
        if let Some(member) = &self.member {
            return Ok(Invoker {
                id: UserId::new(member.user.id.clone()),
                tag: member.user.tag(),
                roles: member.roles.iter().map(|r| RoleId::new(r.clone())).collect(),
            });
        }
        self.user
            .as_ref()
            .map(|user| Invoker { id: UserId::new(user.id.clone()), tag: user.tag(), roles: Vec::new() })
            .ok_or_else(|| DiscordError::MalformedPayload("missing member and user".into()))
    }
}

fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Message create/edit body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageBody {
    /// Plain text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Embeds
    pub embeds: Vec<WireEmbed>,
    /// Action rows
    pub components: Vec<ActionRow>,
    /// Message flags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl From<&OutboundMessage> for MessageBody {
    fn from(message: &OutboundMessage) -> Self {
        Self {
            content: message.content.clone(),
            embeds: message.embeds.iter().map(WireEmbed::from).collect(),
            components: message
                .components
                .iter()
                .map(|row| ActionRow::new(row.iter().map(WireComponent::from).collect()))
                .collect(),
            flags: message.ephemeral.then_some(EPHEMERAL_FLAG),
        }
    }
}

/// Embed on the wire
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WireEmbed {
    /// Title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Colour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// Fields
    pub fields: Vec<EmbedField>,
    /// Footer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
    /// ISO 8601 timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Embed footer
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Footer {
    /// Footer text
    pub text: String,
}

impl From<&Embed> for WireEmbed {
    fn from(embed: &Embed) -> Self {
        Self {
            title: embed.title.clone(),
            description: embed.description.clone(),
            color: embed.color,
            fields: embed.fields.clone(),
            footer: embed.footer.clone().map(|text| Footer { text }),
            timestamp: embed.timestamp.map(|t| t.to_rfc3339()),
        }
    }
}

/// Action row (component type 1)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    /// Row contents
    pub components: Vec<WireComponent>,
}

impl ActionRow {
    /// Row holding `components`
    #[must_use]
    pub const fn new(components: Vec<WireComponent>) -> Self {
        Self { kind: 1, components }
    }
}

/// Button (type 2) or text input (type 4)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WireComponent {
    #[serde(rename = "type")]
    kind: u8,
    /// Identifier
    pub custom_id: String,
    /// Caption
    pub label: String,
    /// Button or input style code
    pub style: u8,
    /// Button disabled flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    /// Input placeholder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Input minimum length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u16>,
    /// Input maximum length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
    /// Input required flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

const fn button_style(style: ButtonStyle) -> u8 {
    match style {
        ButtonStyle::Primary => 1,
        ButtonStyle::Secondary => 2,
        ButtonStyle::Success => 3,
        ButtonStyle::Danger => 4,
    }
}

impl From<&Button> for WireComponent {
    fn from(button: &Button) -> Self {
        Self {
            kind: 2,
            custom_id: button.custom_id.clone(),
            label: button.label.clone(),
            style: button_style(button.style),
            disabled: Some(button.disabled),
            placeholder: None,
            min_length: None,
            max_length: None,
            required: None,
        }
    }
}

/// Modal body
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModalBody {
    /// Identifier
    pub custom_id: String,
    /// Title
    pub title: String,
    /// One row per input
    pub components: Vec<ActionRow>,
}

impl From<&Modal> for ModalBody {
    fn from(modal: &Modal) -> Self {
        Self {
            custom_id: modal.custom_id.clone(),
            title: modal.title.clone(),
            components: modal
                .inputs
                .iter()
                .map(|input| {
                    ActionRow::new(vec![WireComponent {
                        kind: 4,
                        custom_id: input.custom_id.clone(),
                        label: input.label.clone(),
                        style: 1,
                        disabled: None,
                        placeholder: input.placeholder.clone(),
                        min_length: Some(input.min_length),
                        max_length: Some(input.max_length),
                        required: Some(input.required),
                    }])
                })
                .collect(),
        }
    }
}

/// Interaction callback data
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CallbackData {
    /// Message reply or update
    Message(MessageBody),
    /// Modal
    Modal(ModalBody),
}

/// Response body of the interactions endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InteractionCallback {
    /// Callback type code
    #[serde(rename = "type")]
    pub kind: u8,
    /// Callback data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CallbackData>,
}

impl InteractionCallback {
    /// Answer to a PING
    #[must_use]
    pub const fn pong() -> Self {
        Self { kind: callback_type::PONG, data: None }
    }
}

impl From<&InteractionReply> for InteractionCallback {
    fn from(reply: &InteractionReply) -> Self {
        match reply {
            InteractionReply::Message(message) => Self {
                kind: callback_type::CHANNEL_MESSAGE,
                data: Some(CallbackData::Message(message.into())),
            },
            InteractionReply::UpdateMessage(message) => Self {
                kind: callback_type::UPDATE_MESSAGE,
                data: Some(CallbackData::Message(message.into())),
            },
            InteractionReply::Modal(modal) => Self {
                kind: callback_type::MODAL,
                data: Some(CallbackData::Modal(modal.into())),
            },
        }
    }
}

/// Permission overwrite on the wire; bitsets are decimal strings
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WireOverwrite {
    /// Role or member id
    pub id: String,
    /// 0 = role, 1 = member
    #[serde(rename = "type")]
    pub kind: u8,
    /// Granted bits
    pub allow: String,
    /// Revoked bits
    pub deny: String,
}

impl From<&PermissionOverwrite> for WireOverwrite {
    fn from(overwrite: &PermissionOverwrite) -> Self {
        let (id, kind) = match &overwrite.target {
            OverwriteTarget::Role(role) => (role.as_str().to_string(), 0),
            OverwriteTarget::Member(user) => (user.as_str().to_string(), 1),
        };
        Self { id, kind, allow: overwrite.allow.to_string(), deny: overwrite.deny.to_string() }
    }
}

/// Guild channel create body
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateChannelBody {
    /// Channel name
    pub name: String,
    /// 0 = text channel
    #[serde(rename = "type")]
    pub kind: u8,
    /// Category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Overrides
    pub permission_overwrites: Vec<WireOverwrite>,
}

/// Slash command registration
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandDefinition {
    /// Command name
    pub name: String,
    /// Help text
    pub description: String,
    /// 1 = chat input
    #[serde(rename = "type")]
    pub kind: u8,
    /// String options
    pub options: Vec<CommandOption>,
}

impl CommandDefinition {
    /// Chat-input command without options
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), kind: 1, options: Vec::new() }
    }

    /// Add a string option
    #[must_use]
    pub fn string_option(mut self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.options.push(CommandOption {
            kind: 3,
            name: name.into(),
            description: description.into(),
            required,
        });
        self
    }
}

/// Command option definition
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandOption {
    /// 3 = string
    #[serde(rename = "type")]
    pub kind: u8,
    /// Option name
    pub name: String,
    /// Help text
    pub description: String,
    /// Must be supplied
    pub required: bool,
}

/// Object carrying only an id (created message, channel, DM)
#[derive(Debug, Clone, Deserialize)]
pub struct IdResponse {
    /// Snowflake
    pub id: String,
}

/// Message as returned by the channel history endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    /// Message id
    pub id: String,
    /// Author
    pub author: IdResponse,
    /// Embeds
    #[serde(default)]
    pub embeds: Vec<WireEmbedTitle>,
}

/// The part of a received embed the bot reads
#[derive(Debug, Clone, Deserialize)]
pub struct WireEmbedTitle {
    /// Title
    #[serde(default)]
    pub title: Option<String>,
}
