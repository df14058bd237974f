//! Whitelist request records and the status machine.
//!
//! A [`WhitelistRequest`] is keyed by the Discord identity of the person who
//! asked for access. Its [`RequestStatus`] only moves through
//! [`RequestStatus::decide`], a total function over `(status, decision)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw snowflake string
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Raw snowflake string
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

snowflake_id!(
    /// Discord user identity. Submitters and staff members are both users.
    UserId
);
snowflake_id!(
    /// Discord role identity
    RoleId
);
snowflake_id!(
    /// Discord channel identity (guild text channels and DM channels alike)
    ChannelId
);
snowflake_id!(
    /// Discord message identity
    MessageId
);
snowflake_id!(
    /// Discord guild identity
    GuildId
);

impl UserId {
    /// Mention markup for this user
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl RoleId {
    /// Mention markup for this role
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.0)
    }
}

impl ChannelId {
    /// Mention markup for this channel
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}

// ============================================================================
// Game account
// ============================================================================

/// Minimum length of a Minecraft account name
pub const ACCOUNT_NAME_MIN: usize = 3;
/// Maximum length of a Minecraft account name
pub const ACCOUNT_NAME_MAX: usize = 16;

/// Rejected game-account name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidAccountName {
    /// Outside the 3..=16 character range
    #[error("account name must be 3 to 16 characters, got {0}")]
    Length(usize),

    /// Contains something other than letters, digits and underscores
    #[error("account name may only contain letters, digits and underscores")]
    Charset,
}

/// A Minecraft account name.
///
/// Case is preserved for display; [`GameAccount::key`] gives the lowercased
/// form used for every comparison, so `Steve` and `STEVE` are the same account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameAccount(String);

impl GameAccount {
    /// Validate and wrap an account name (surrounding whitespace is trimmed).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidAccountName`] if the name has the wrong length or
    /// contains characters Minecraft does not allow.
    pub fn parse(raw: &str) -> Result<Self, InvalidAccountName> {
        let name = raw.trim();
        let len = name.chars().count();
        if !(ACCOUNT_NAME_MIN..=ACCOUNT_NAME_MAX).contains(&len) {
            return Err(InvalidAccountName::Length(len));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(InvalidAccountName::Charset);
        }
        Ok(Self(name.to_string()))
    }

    /// Wrap a name read back from storage without re-validating it
    #[must_use]
    pub fn from_stored(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name as the submitter typed it
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded comparison key
    #[must_use]
    pub fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Case-insensitive match against another name
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for GameAccount {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for GameAccount {}

impl std::hash::Hash for GameAccount {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for GameAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Status machine
// ============================================================================

/// Review status of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Waiting for staff
    #[default]
    Pending,
    /// Granted; the account is on the server whitelist
    Approved,
    /// Refused
    Denied,
    /// Moved to a discussion channel; still awaiting a decision
    Ticket,
}

/// A staff decision on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Grant access
    Approve,
    /// Refuse access
    Deny,
    /// Open a ticket channel to discuss the request
    Escalate,
}

/// A decision that is not allowed from the current status
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot {decision} a request that is {from}")]
pub struct InvalidTransition {
    /// Status the record was in
    pub from: RequestStatus,
    /// Decision that was attempted
    pub decision: Decision,
}

impl RequestStatus {
    /// All statuses, in display order
    pub const ALL: [Self; 4] = [Self::Pending, Self::Approved, Self::Denied, Self::Ticket];

    /// Stored representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
            Self::Ticket => "TICKET",
        }
    }

    /// Human label with an emoji, as shown in Discord embeds
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "⏳ PENDING",
            Self::Approved => "✅ APPROVED",
            Self::Denied => "❌ DENIED",
            Self::Ticket => "🎫 TICKET CREATED",
        }
    }

    /// Whether staff can still act on the request
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Ticket)
    }

    /// Apply a staff decision.
    ///
    /// `Pending` accepts every decision, `Ticket` accepts approve and deny,
    /// and every other combination is rejected without touching the record.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for any pair not listed above.
    pub const fn decide(self, decision: Decision) -> Result<Self, InvalidTransition> {
        match (self, decision) {
            (Self::Pending | Self::Ticket, Decision::Approve) => Ok(Self::Approved),
            (Self::Pending | Self::Ticket, Decision::Deny) => Ok(Self::Denied),
            (Self::Pending, Decision::Escalate) => Ok(Self::Ticket),
            (from, decision) => Err(InvalidTransition { from, decision }),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored status text that matches no known status
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown request status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    /// Accepts the canonical names plus the labels earlier deployments wrote
    /// (`EN_ATTENTE`, `✅ APPROVED`, `🎫 TICKET CREATED`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        if upper.contains("APPROVED") {
            Ok(Self::Approved)
        } else if upper.contains("DENIED") {
            Ok(Self::Denied)
        } else if upper.contains("TICKET") {
            Ok(Self::Ticket)
        } else if upper.contains("PENDING") || upper.contains("EN_ATTENTE") {
            Ok(Self::Pending)
        } else {
            Err(UnknownStatus(s.to_string()))
        }
    }
}

impl Decision {
    /// Lowercase verb used in button ids and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::Escalate => "ticket",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Record
// ============================================================================

/// Who moved a request out of `PENDING`, and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processing {
    /// Staff display name
    pub by: String,
    /// Time of the transition
    pub at: DateTime<Utc>,
}

/// A whitelist request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistRequest {
    /// Discord user who asked (unique key)
    pub submitter_id: UserId,
    /// Display tag of the submitter at request time
    pub submitter_tag: String,
    /// Requested Minecraft account
    pub game_account: GameAccount,
    /// When the request was created
    pub requested_at: DateTime<Utc>,
    /// Review status
    pub status: RequestStatus,
    /// Set together with any move away from `PENDING`
    pub processed: Option<Processing>,
}

impl WhitelistRequest {
    /// New `PENDING` request
    #[must_use]
    pub fn new(
        submitter_id: UserId,
        submitter_tag: impl Into<String>,
        game_account: GameAccount,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            submitter_id,
            submitter_tag: submitter_tag.into(),
            game_account,
            requested_at,
            status: RequestStatus::Pending,
            processed: None,
        }
    }

    /// Apply a decision, stamping the acting staff member and time.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the current status does not accept `decision`;
    /// the record is left untouched.
    pub fn apply(
        &mut self,
        decision: Decision,
        staff: &str,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.status = self.status.decide(decision)?;
        self.processed = Some(Processing { by: staff.to_string(), at });
        Ok(())
    }

    /// `https://namemc.com/profile/<name>`
    #[must_use]
    pub fn profile_url(&self) -> String {
        format!("https://namemc.com/profile/{}", self.game_account)
    }
}
