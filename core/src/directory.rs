//! Game-server access directory abstraction.
//!
//! The directory is the server's whitelist: a set of account names allowed
//! to join. It owns no logic; the lifecycle engine decides when to toggle it.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised while reading or changing membership.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The game server could not be reached.
    #[error("Directory connection failed: {0}")]
    Connection(String),

    /// The game server refused our credentials.
    #[error("Directory authentication failed")]
    Authentication,

    /// The game server answered with something we could not interpret.
    #[error("Unexpected directory response: {0}")]
    Protocol(String),

    /// The directory worker is no longer running.
    #[error("Directory worker stopped")]
    WorkerStopped,
}

/// Boxed future returned by [`AccessDirectory`] methods
pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DirectoryError>> + Send + 'a>>;

/// Boolean membership for game accounts.
pub trait AccessDirectory: Send + Sync {
    /// Whether `name` is on the whitelist (case-insensitive).
    fn is_member(&self, name: String) -> DirectoryFuture<'_, bool>;

    /// Add (`true`) or remove (`false`) `name`. Idempotent.
    fn set_member(&self, name: String, member: bool) -> DirectoryFuture<'_, ()>;
}
