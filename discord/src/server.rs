//! HTTP interactions endpoint.
//!
//! ```text
//! POST /interactions   signed interaction → callback JSON
//! GET  /health         liveness
//! ```

use crate::error::DiscordError;
use crate::signature::{SIGNATURE_HEADER, SignatureVerifier, TIMESTAMP_HEADER};
use crate::wire::{Decoded, Interaction, InteractionCallback};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use std::sync::Arc;
use whitelist_core::messaging::{InboundEvent, InteractionHandler};

/// Shared state of the interactions endpoint
#[derive(Clone)]
pub struct InteractionsState {
    handler: Arc<dyn InteractionHandler>,
    verifier: Arc<SignatureVerifier>,
}

/// Build the interactions router.
///
/// # Example
///
/// ```ignore
/// let app = interactions_router(router, SignatureVerifier::from_hex(&public_key)?);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// ```
pub fn interactions_router(handler: Arc<dyn InteractionHandler>, verifier: SignatureVerifier) -> Router {
    let state = InteractionsState { handler, verifier: Arc::new(verifier) };
    Router::new()
        .route("/interactions", post(handle_interaction))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Liveness probe.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, DiscordError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(DiscordError::MissingHeader(name))
}

/// Verify, decode and dispatch one interaction.
///
/// # Errors
///
/// Returns a [`DiscordError`] (rendered as `401`/`400`) if the request is not
/// signed by Discord or cannot be decoded.
pub async fn handle_interaction(
    State(state): State<InteractionsState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InteractionCallback>, DiscordError> {
    let signature = header(&headers, SIGNATURE_HEADER)?;
    let timestamp = header(&headers, TIMESTAMP_HEADER)?;
    state.verifier.verify(timestamp, &body, signature)?;

    let interaction: Interaction =
        serde_json::from_slice(&body).map_err(|e| DiscordError::MalformedPayload(e.to_string()))?;

    match interaction.decode()? {
        Decoded::Ping => {
            tracing::debug!("Answered ping");
            Ok(Json(InteractionCallback::pong()))
        },
        Decoded::Event(event) => {
            let kind = match &event {
                InboundEvent::SlashCommand { .. } => "command",
                InboundEvent::Button { .. } => "button",
                InboundEvent::ModalSubmit { .. } => "modal",
            };
            metrics::counter!("discord.interactions", "kind" => kind).increment(1);
            tracing::debug!(kind, invoker = %event.invoker().id, "Dispatching interaction");

            let reply = state.handler.handle(event).await;
            Ok(Json(InteractionCallback::from(&reply)))
        },
    }
}
