//! Error types for the Discord adapter.
//!
//! [`DiscordError`] covers the interactions endpoint and command registration.
//! It implements Axum's `IntoResponse`, so handlers can return it directly:
//! verification failures become `401`, undecodable payloads `400`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use whitelist_core::messaging::MessagingError;

/// Errors raised by the Discord adapter.
#[derive(Error, Debug)]
pub enum DiscordError {
    /// The configured application public key is not a valid Ed25519 key.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A required request header is absent or not valid UTF-8.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// The request signature does not verify against the public key.
    #[error("Invalid request signature")]
    InvalidSignature,

    /// The request body is not a recognisable interaction.
    #[error("Malformed interaction: {0}")]
    MalformedPayload(String),

    /// The interaction type is not handled by the bot.
    #[error("Unsupported interaction type {0}")]
    UnsupportedInteraction(u8),

    /// A REST call failed.
    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

impl DiscordError {
    /// HTTP status returned to Discord for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::MalformedPayload(_) | Self::UnsupportedInteraction(_) => StatusCode::BAD_REQUEST,
            Self::InvalidPublicKey(_) | Self::Messaging(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for DiscordError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Interaction failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Interaction rejected");
        }
        metrics::counter!("discord.interactions.rejected", "status" => status.as_str().to_string())
            .increment(1);

        (status, Json(ErrorResponse { message: self.to_string() })).into_response()
    }
}
