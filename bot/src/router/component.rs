//! Custom ids, modal layout and slash commands.
//!
//! Every id the bot puts on a button or modal is produced and parsed here, so
//! the mapping from raw id to behaviour lives in one place.

use whitelist_core::messaging::{Modal, TextInput, find_value};
use whitelist_core::request::{ACCOUNT_NAME_MAX, ACCOUNT_NAME_MIN, Decision, UserId};
use whitelist_discord::CommandDefinition;

/// Modal asking for the account name
pub const WHITELIST_MODAL: &str = "whitelist_modal";
/// Text input inside [`WHITELIST_MODAL`]
pub const USERNAME_INPUT: &str = "minecraft_username";

/// A decoded button id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    /// Panel button: open the request form
    RequestWhitelist,
    /// Verification prompt: persist the draft
    ConfirmRequest,
    /// Verification prompt: drop the draft
    CancelRequest,
    /// Staff review button
    Admin {
        /// What the button does
        decision: Decision,
        /// Whose request it targets
        submitter: UserId,
    },
    /// List navigation, sent from page `from`
    ListPrevious {
        /// Page the button was on
        from: usize,
    },
    /// List navigation, sent from page `from`
    ListNext {
        /// Page the button was on
        from: usize,
    },
    /// The disabled page indicator
    PageInfo,
    /// Ticket channel: ask to close
    CloseTicket,
    /// Ticket channel: close for real
    ConfirmCloseTicket,
    /// Ticket channel: keep it open
    CancelCloseTicket,
}

impl ComponentAction {
    /// Decode a custom id; `None` for ids this bot never issues.
    #[must_use]
    pub fn parse(custom_id: &str) -> Option<Self> {
        let action = match custom_id {
            "request_whitelist" => Self::RequestWhitelist,
            "confirm_request" => Self::ConfirmRequest,
            "cancel_request" => Self::CancelRequest,
            "page_info" => Self::PageInfo,
            "close_ticket" => Self::CloseTicket,
            "confirm_close_ticket" => Self::ConfirmCloseTicket,
            "cancel_close_ticket" => Self::CancelCloseTicket,
            other => return Self::parse_parameterised(other),
        };
        Some(action)
    }

    fn parse_parameterised(custom_id: &str) -> Option<Self> {
        if let Some(page) = custom_id.strip_prefix("nav_list_prev_") {
            return page.parse().ok().map(|from| Self::ListPrevious { from });
        }
        if let Some(page) = custom_id.strip_prefix("nav_list_next_") {
            return page.parse().ok().map(|from| Self::ListNext { from });
        }
        let rest = custom_id.strip_prefix("admin_")?;
        let (verb, submitter) = rest.split_once('_')?;
        let decision = match verb {
            "approve" => Decision::Approve,
            "deny" => Decision::Deny,
            "ticket" => Decision::Escalate,
            _ => return None,
        };
        if submitter.is_empty() || !submitter.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self::Admin { decision, submitter: UserId::new(submitter) })
    }

    /// The custom id to put on a button.
    #[must_use]
    pub fn custom_id(&self) -> String {
        match self {
            Self::RequestWhitelist => "request_whitelist".to_string(),
            Self::ConfirmRequest => "confirm_request".to_string(),
            Self::CancelRequest => "cancel_request".to_string(),
            Self::Admin { decision, submitter } => format!("admin_{decision}_{submitter}"),
            Self::ListPrevious { from } => format!("nav_list_prev_{from}"),
            Self::ListNext { from } => format!("nav_list_next_{from}"),
            Self::PageInfo => "page_info".to_string(),
            Self::CloseTicket => "close_ticket".to_string(),
            Self::ConfirmCloseTicket => "confirm_close_ticket".to_string(),
            Self::CancelCloseTicket => "cancel_close_ticket".to_string(),
        }
    }
}

/// The request form.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Name bounds are tiny constants
pub fn whitelist_modal() -> Modal {
    Modal {
        custom_id: WHITELIST_MODAL.to_string(),
        title: "Minecraft Whitelist Request".to_string(),
        inputs: vec![TextInput {
            custom_id: USERNAME_INPUT.to_string(),
            label: "Minecraft Username".to_string(),
            placeholder: Some("Enter your exact Minecraft username".to_string()),
            min_length: ACCOUNT_NAME_MIN as u16,
            max_length: ACCOUNT_NAME_MAX as u16,
            required: true,
        }],
    }
}

/// A decoded slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// `/whitelist-list`
    List,
    /// `/whitelist-remove <username>`
    Remove {
        /// Account to remove, as typed
        username: String,
    },
    /// `/whitelist-lookup <username>`
    Lookup {
        /// Account to look up, as typed
        username: String,
    },
}

impl SlashCommand {
    /// Decode a command by name and options; `None` for unknown commands or
    /// a missing `username`.
    #[must_use]
    pub fn parse(name: &str, options: &[(String, String)]) -> Option<Self> {
        let username = || find_value(options, "username").map(|u| u.trim().to_string());
        match name {
            "whitelist-list" => Some(Self::List),
            "whitelist-remove" => username().map(|username| Self::Remove { username }),
            "whitelist-lookup" => username().map(|username| Self::Lookup { username }),
            _ => None,
        }
    }

    /// Metric label
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List => "whitelist-list",
            Self::Remove { .. } => "whitelist-remove",
            Self::Lookup { .. } => "whitelist-lookup",
        }
    }
}

/// Guild commands registered at startup.
#[must_use]
pub fn command_definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("whitelist-list", "Display the list of whitelist requests"),
        CommandDefinition::new("whitelist-remove", "Remove a player from the whitelist").string_option(
            "username",
            "Minecraft username to remove",
            true,
        ),
        CommandDefinition::new("whitelist-lookup", "Show the whitelist record of a player").string_option(
            "username",
            "Minecraft username to look up",
            true,
        ),
    ]
}
