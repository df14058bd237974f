//! Discord bot that manages Minecraft whitelist requests.
//!
//! Players ask for access through a button and a form, staff approve, deny or
//! open a ticket from the review message, and approved accounts are added to
//! the game server's whitelist over RCON.
//!
//! # Modules
//!
//! - [`lifecycle`]: the request state machine, built on the workspace `Store`
//! - [`directory`]: the game server whitelist, driven from one worker thread
//! - [`dispatcher`]: staff announcements, DMs and ticket channels
//! - [`router`]: slash commands, buttons and modal submits
//! - [`config`] and [`app`]: environment configuration and process wiring

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod lifecycle;
pub mod router;

pub use config::{Config, ConfigError};
pub use directory::DirectoryActor;
pub use dispatcher::{ChannelLayout, Dispatcher};
pub use lifecycle::{LifecycleEngine, LifecycleEnvironment, LifecycleError};
pub use router::InteractionRouter;
