//! Discord adapter for the whitelist request bot.
//!
//! Two halves:
//!
//! - [`DiscordClient`]: REST client implementing the core `Messenger` trait,
//!   plus slash-command registration.
//! - [`interactions_router`]: axum router for the HTTP interactions endpoint.
//!   Every request is verified with Ed25519 before it is decoded into an
//!   `InboundEvent` and handed to the `InteractionHandler`.
//!
//! # Request Flow
//!
//! 1. **Verify** `X-Signature-Ed25519` over `timestamp || body`
//! 2. **Decode** the interaction (PING is answered directly)
//! 3. **Dispatch** the event to the handler
//! 4. **Encode** the handler's reply as an interaction callback

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod server;
pub mod signature;
pub mod wire;

pub use client::{DEFAULT_API_BASE, DiscordClient};
pub use error::DiscordError;
pub use server::{InteractionsState, interactions_router};
pub use signature::SignatureVerifier;
pub use wire::CommandDefinition;
