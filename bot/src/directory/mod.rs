//! Access directory actor.
//!
//! The game server's whitelist is not safe to mutate concurrently, so every
//! read and write goes through one dedicated OS thread that owns a blocking
//! [`DirectoryBackend`]. Callers hold a cheap [`DirectoryActor`] handle, send
//! a command over a channel and await a oneshot reply.

pub mod memory;
pub mod rcon;

pub use memory::MemoryBackend;
pub use rcon::{RconBackend, RconConfig};

use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;
use whitelist_core::directory::{AccessDirectory, DirectoryError, DirectoryFuture};

/// Blocking membership store driven by the directory thread.
pub trait DirectoryBackend: Send + 'static {
    /// Whether `name` is on the whitelist.
    ///
    /// # Errors
    ///
    /// Any [`DirectoryError`] the backend hits.
    fn is_member(&mut self, name: &str) -> Result<bool, DirectoryError>;

    /// Add or remove `name`.
    ///
    /// # Errors
    ///
    /// Any [`DirectoryError`] the backend hits.
    fn set_member(&mut self, name: &str, member: bool) -> Result<(), DirectoryError>;
}

enum Command {
    IsMember { name: String, reply: oneshot::Sender<Result<bool, DirectoryError>> },
    SetMember { name: String, member: bool, reply: oneshot::Sender<Result<(), DirectoryError>> },
}

/// Handle to the directory thread.
///
/// The thread exits once every handle is dropped.
#[derive(Clone, Debug)]
pub struct DirectoryActor {
    commands: mpsc::Sender<Command>,
}

impl DirectoryActor {
    /// Start the directory thread over `backend`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn spawn<B: DirectoryBackend>(mut backend: B) -> std::io::Result<Self> {
        let (commands, inbox) = mpsc::channel::<Command>();

        thread::Builder::new().name("directory".to_string()).spawn(move || {
            tracing::debug!("Directory thread started");
            while let Ok(command) = inbox.recv() {
                match command {
                    Command::IsMember { name, reply } => {
                        let _ = reply.send(backend.is_member(&name));
                    },
                    Command::SetMember { name, member, reply } => {
                        let result = backend.set_member(&name, member);
                        let outcome = if result.is_ok() { "ok" } else { "error" };
                        metrics::counter!("directory.writes", "outcome" => outcome).increment(1);
                        match &result {
                            Ok(()) => tracing::info!(account = %name, member, "Whitelist updated"),
                            Err(error) => tracing::warn!(account = %name, member, %error, "Whitelist update failed"),
                        }
                        let _ = reply.send(result);
                    },
                }
            }
            tracing::debug!("Directory thread stopped");
        })?;

        Ok(Self { commands })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, DirectoryError>>) -> Command,
    ) -> Result<T, DirectoryError> {
        let (reply, answer) = oneshot::channel();
        self.commands.send(build(reply)).map_err(|_| DirectoryError::WorkerStopped)?;
        answer.await.map_err(|_| DirectoryError::WorkerStopped)?
    }
}

impl AccessDirectory for DirectoryActor {
    fn is_member(&self, name: String) -> DirectoryFuture<'_, bool> {
        Box::pin(self.request(move |reply| Command::IsMember { name, reply }))
    }

    fn set_member(&self, name: String, member: bool) -> DirectoryFuture<'_, ()> {
        Box::pin(self.request(move |reply| Command::SetMember { name, member, reply }))
    }
}
