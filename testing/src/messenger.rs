//! Recording messenger.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use whitelist_core::messaging::{
    ChannelSpec, Messenger, MessagingError, MessagingFuture, OutboundMessage, PostedMessage,
};
use whitelist_core::request::{ChannelId, MessageId, UserId};

/// Id the recording messenger uses as its own author id
pub const BOT_USER: &str = "bot";

/// A message captured by [`RecordingMessenger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination channel
    pub channel: ChannelId,
    /// Assigned id
    pub id: MessageId,
    /// Payload
    pub message: OutboundMessage,
}

#[derive(Debug, Default)]
struct Recorded {
    sent: Vec<SentMessage>,
    edits: Vec<(ChannelId, MessageId, OutboundMessage)>,
    created: Vec<(ChannelId, ChannelSpec)>,
    deleted: Vec<(ChannelId, Duration)>,
    seeded: HashMap<ChannelId, Vec<PostedMessage>>,
}

/// [`Messenger`] that records every call instead of talking to a gateway.
///
/// Direct-message channels are `dm-<user id>`; created channels and messages
/// get sequential ids. `set_failing` makes every call fail with a transport
/// error, the way a gateway outage would.
#[derive(Clone, Debug, Default)]
pub struct RecordingMessenger {
    recorded: Arc<RwLock<Recorded>>,
    next_id: Arc<AtomicU64>,
    failing: Arc<AtomicBool>,
}

impl RecordingMessenger {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Pretend `messages` (newest first) already exist in `channel`
    pub fn seed_recent(&self, channel: &ChannelId, messages: Vec<PostedMessage>) {
        self.recorded.write().unwrap().seeded.insert(channel.clone(), messages);
    }

    /// Every message sent, in order
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.recorded.read().unwrap().sent.clone()
    }

    /// Messages sent to one channel
    #[must_use]
    pub fn sent_to(&self, channel: &ChannelId) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| &m.channel == channel)
            .map(|m| m.message)
            .collect()
    }

    /// Direct messages delivered to a user
    #[must_use]
    pub fn direct_messages(&self, user: &UserId) -> Vec<OutboundMessage> {
        self.sent_to(&Self::dm_channel(user))
    }

    /// Every message edit, in order
    #[must_use]
    pub fn edits(&self) -> Vec<(ChannelId, MessageId, OutboundMessage)> {
        self.recorded.read().unwrap().edits.clone()
    }

    /// Every created channel with the spec it was created from
    #[must_use]
    pub fn created_channels(&self) -> Vec<(ChannelId, ChannelSpec)> {
        self.recorded.read().unwrap().created.clone()
    }

    /// Every scheduled channel deletion
    #[must_use]
    pub fn deleted_channels(&self) -> Vec<(ChannelId, Duration)> {
        self.recorded.read().unwrap().deleted.clone()
    }

    /// DM channel id used for `user`
    #[must_use]
    pub fn dm_channel(user: &UserId) -> ChannelId {
        ChannelId::new(format!("dm-{user}"))
    }

    fn check(&self) -> Result<(), MessagingError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(MessagingError::Transport("simulated gateway outage".to_string()))
        } else {
            Ok(())
        }
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl Messenger for RecordingMessenger {
    fn send_message(&self, channel: ChannelId, message: OutboundMessage) -> MessagingFuture<'_, MessageId> {
        Box::pin(async move {
            self.check()?;
            let id = MessageId::new(self.next("msg"));
            self.recorded.write().unwrap().sent.push(SentMessage { channel, id: id.clone(), message });
            Ok(id)
        })
    }

    fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        edit: OutboundMessage,
    ) -> MessagingFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.recorded.write().unwrap().edits.push((channel, message, edit));
            Ok(())
        })
    }

    fn delete_channel(&self, channel: ChannelId, delay: Duration) -> MessagingFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.recorded.write().unwrap().deleted.push((channel, delay));
            Ok(())
        })
    }

    fn create_channel(&self, spec: ChannelSpec) -> MessagingFuture<'_, ChannelId> {
        Box::pin(async move {
            self.check()?;
            let id = ChannelId::new(self.next("channel"));
            self.recorded.write().unwrap().created.push((id.clone(), spec));
            Ok(id)
        })
    }

    fn open_direct_message(&self, user: UserId) -> MessagingFuture<'_, ChannelId> {
        Box::pin(async move {
            self.check()?;
            Ok(Self::dm_channel(&user))
        })
    }

    fn recent_messages(&self, channel: ChannelId, limit: u8) -> MessagingFuture<'_, Vec<PostedMessage>> {
        Box::pin(async move {
            self.check()?;
            let recorded = self.recorded.read().unwrap();
            let mut messages: Vec<PostedMessage> = recorded
                .sent
                .iter()
                .rev()
                .filter(|m| m.channel == channel)
                .map(|m| PostedMessage {
                    id: m.id.clone(),
                    author: UserId::new(BOT_USER),
                    embed_title: m.message.embeds.first().and_then(|e| e.title.clone()),
                })
                .collect();
            messages.extend(recorded.seeded.get(&channel).cloned().unwrap_or_default());
            messages.truncate(usize::from(limit));
            Ok(messages)
        })
    }
}
