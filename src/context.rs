//! Invocation context: where and by whom a command was invoked, plus the
//! narrow seam the core uses to talk back to the chat platform.
//!
//! The dispatcher and commands only ever need three capabilities from the
//! platform: deliver text to the invoking channel ([`Replier`]), know whether
//! the author holds elevated privileges ([`Author::elevated`]), and wait for
//! the author's next reply with a timeout ([`Prompter`]). The gateway
//! implements these over serenity; tests implement them in memory.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Discord guild reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub u64);

/// Discord channel reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

/// Discord user reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The invoking user.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    /// Whether the author holds elevated privileges in the invoking
    /// location. Resolved by the gateway before dispatch; DMs are never
    /// elevated unless the user is a configured admin.
    pub elevated: bool,
}

/// One incoming candidate command invocation. Ephemeral; lives for a single
/// dispatch.
#[derive(Clone)]
pub struct Invocation {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author: Author,
    pub replier: Arc<dyn Replier>,
    pub prompter: Arc<dyn Prompter>,
}

impl Invocation {
    /// Send text to the invoking channel, bounded to the platform limit.
    pub async fn say(&self, text: &str) -> anyhow::Result<()> {
        let bounded = crate::format::bound_str(text, crate::format::DISCORD_MESSAGE_LIMIT);
        self.replier.send(&bounded).await
    }
}

/// Outbound text delivery to the invoking channel.
#[async_trait]
pub trait Replier: Send + Sync {
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}

/// Outcome of waiting for the invoking user's next reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReply {
    Message(String),
    /// The user explicitly aborted the prompt.
    Cancelled,
    /// The wait elapsed with no reply. Never hangs indefinitely.
    TimedOut,
}

/// Suspension point: wait for the invoking user's next message in the
/// invoking channel. Other dispatches keep running while this one waits.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn next_reply(&self, timeout: Duration) -> PromptReply;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use anyhow::bail;
    use parking_lot::Mutex;

    use super::*;

    /// Records every sent message; optionally fails every send.
    pub(crate) struct RecordingReplier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingReplier {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        pub(crate) fn failing() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        pub(crate) fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Replier for RecordingReplier {
        async fn send(&self, text: &str) -> anyhow::Result<()> {
            if self.fail {
                bail!("connection to the gateway is closing");
            }
            self.sent.lock().push(text.to_string());
            Ok(())
        }
    }

    /// Hands out scripted replies in order; times out once exhausted.
    pub(crate) struct ScriptedPrompter {
        replies: Mutex<VecDeque<PromptReply>>,
    }

    impl ScriptedPrompter {
        pub(crate) fn new(replies: impl IntoIterator<Item = PromptReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl Prompter for ScriptedPrompter {
        async fn next_reply(&self, _timeout: Duration) -> PromptReply {
            self.replies
                .lock()
                .pop_front()
                .unwrap_or(PromptReply::TimedOut)
        }
    }

    pub(crate) fn invocation(
        guild: Option<u64>,
        elevated: bool,
        replier: Arc<RecordingReplier>,
        prompter: Arc<ScriptedPrompter>,
    ) -> Invocation {
        Invocation {
            guild_id: guild.map(GuildId),
            channel_id: ChannelId(100),
            author: Author {
                id: UserId(7),
                name: "tester".to_string(),
                elevated,
            },
            replier,
            prompter,
        }
    }
}
