//! Serenity wiring: turns gateway events into dispatches and implements the
//! platform seam traits over the Discord HTTP client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::client::{Context, EventHandler};
use serenity::http::Http;
use serenity::model::channel::{Channel, Message};
use serenity::model::gateway::Ready;
use serenity::model::permissions::Permissions;
use serenity::prelude::{Client, GatewayIntents};
use tokio::sync::{RwLock, oneshot};
use tracing::{error, info, warn};

use crate::config::{Config, PrefixOverrides};
use crate::context::{Author, ChannelId, GuildId, Invocation, PromptReply, Prompter, Replier, UserId};
use crate::dispatch::{Dispatcher, parse_command};
use crate::error::{BotError, Result};

/// Waiters keyed by `(channel, user)`: a pending prompt consumes that user's
/// next message in that channel before dispatch sees it.
type PendingPrompts = Arc<Mutex<HashMap<(u64, u64), oneshot::Sender<String>>>>;

/// Delivers text to one channel over the Discord HTTP client.
struct ChannelReplier {
    http: Arc<Http>,
    channel_id: serenity::model::id::ChannelId,
}

#[async_trait]
impl Replier for ChannelReplier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        self.channel_id.say(&self.http, text).await?;
        Ok(())
    }
}

/// Waits for the invoking user's next message in the invoking channel, with
/// a timeout. A reply of `cancel` is the explicit abort signal.
struct GatewayPrompter {
    pending: PendingPrompts,
    channel: u64,
    user: u64,
}

#[async_trait]
impl Prompter for GatewayPrompter {
    async fn next_reply(&self, timeout: Duration) -> PromptReply {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert((self.channel, self.user), tx);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(text)) => {
                if text.trim().eq_ignore_ascii_case("cancel") {
                    PromptReply::Cancelled
                } else {
                    PromptReply::Message(text)
                }
            }
            // Sender dropped: a newer prompt replaced this one.
            Ok(Err(_)) => PromptReply::TimedOut,
            Err(_) => {
                self.pending.lock().remove(&(self.channel, self.user));
                PromptReply::TimedOut
            }
        }
    }
}

/// The bot's event handler.
pub struct WardenBot {
    dispatcher: Dispatcher,
    prefixes: Arc<RwLock<PrefixOverrides>>,
    admin_users: Vec<u64>,
    bot_id: AtomicU64,
    ready_fired: AtomicBool,
    pending: PendingPrompts,
}

impl WardenBot {
    pub fn new(
        dispatcher: Dispatcher,
        prefixes: Arc<RwLock<PrefixOverrides>>,
        admin_users: Vec<u64>,
    ) -> Self {
        Self {
            dispatcher,
            prefixes,
            admin_users,
            bot_id: AtomicU64::new(0),
            ready_fired: AtomicBool::new(false),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether the author holds elevated privileges where the message was
    /// sent. Configured admins always do; in guilds, members with
    /// administrator or manage-guild permissions do; DMs never do.
    async fn is_elevated(&self, ctx: &Context, msg: &Message) -> bool {
        if self.admin_users.contains(&msg.author.id.get()) {
            return true;
        }
        let Some(guild_id) = msg.guild_id else {
            return false;
        };
        let channel = match msg.channel_id.to_channel(&ctx).await {
            Ok(Channel::Guild(channel)) => channel,
            Ok(_) => return false,
            Err(cause) => {
                warn!(channel = %msg.channel_id, %cause, "failed to resolve channel");
                return false;
            }
        };
        let guild = match ctx.http.get_guild(guild_id).await {
            Ok(guild) => guild,
            Err(cause) => {
                warn!(guild = %guild_id, %cause, "failed to fetch guild");
                return false;
            }
        };
        let member = match guild.member(&ctx.http, msg.author.id).await {
            Ok(member) => member,
            Err(cause) => {
                warn!(user = %msg.author.id, %cause, "failed to fetch member");
                return false;
            }
        };
        let permissions = guild.user_permissions_in(&channel, &member);
        permissions.contains(Permissions::ADMINISTRATOR)
            || permissions.contains(Permissions::MANAGE_GUILD)
    }

    /// Run every registered command's startup hook. The gateway re-fires
    /// ready on reconnect; the hooks run once per process.
    async fn fire_ready_hooks(&self) {
        if self.ready_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        let commands = { self.dispatcher.registry().read().await.all_commands() };
        for command in commands {
            command.on_ready().await;
        }
    }
}

#[serenity::async_trait]
impl EventHandler for WardenBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
        self.bot_id.store(ready.user.id.get(), Ordering::SeqCst);
        self.fire_ready_hooks().await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        // A pending prompt for this channel/user consumes the message whole.
        let waiter = self
            .pending
            .lock()
            .remove(&(msg.channel_id.get(), msg.author.id.get()));
        if let Some(tx) = waiter {
            let _ = tx.send(msg.content.clone());
            return;
        }

        let guild_id = msg.guild_id.map(|g| GuildId(g.get()));
        let prefix = {
            self.prefixes.read().await.prefix_for(guild_id).to_string()
        };
        let bot_id = UserId(self.bot_id.load(Ordering::SeqCst));
        let Some((name, args)) = parse_command(&msg.content, &prefix, bot_id) else {
            return;
        };

        let elevated = self.is_elevated(&ctx, &msg).await;
        let inv = Invocation {
            guild_id,
            channel_id: ChannelId(msg.channel_id.get()),
            author: Author {
                id: UserId(msg.author.id.get()),
                name: msg.author.name.clone(),
                elevated,
            },
            replier: Arc::new(ChannelReplier {
                http: ctx.http.clone(),
                channel_id: msg.channel_id,
            }),
            prompter: Arc::new(GatewayPrompter {
                pending: self.pending.clone(),
                channel: msg.channel_id.get(),
                user: msg.author.id.get(),
            }),
        };

        if let Err(cause) = self.dispatcher.dispatch(&inv, &name, &args, &msg.content).await {
            error!(command = %name, cause = ?cause, "dispatch escalated an error");
        }
    }
}

/// Create the Discord client (without starting it).
pub async fn create_client(config: &Config, handler: WardenBot) -> Result<Client> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut builder = Client::builder(&config.discord.token, intents).event_handler(handler);
    if let Some(app_id) = config.discord.application_id {
        builder = builder.application_id(app_id.into());
    }
    builder.await.map_err(BotError::Gateway)
}

/// Create and run the bot until the gateway connection ends.
pub async fn run_bot(config: &Config, handler: WardenBot) -> Result<()> {
    let mut client = create_client(config, handler).await?;
    info!("starting gateway client");
    client.start().await.map_err(BotError::Gateway)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::command::{Category, Command, CommandFailure, CommandMeta};
    use crate::registry::CommandRegistry;

    struct BackgroundTask {
        meta: CommandMeta,
        fired: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Command for BackgroundTask {
        fn meta(&self) -> &CommandMeta {
            &self.meta
        }

        async fn run(
            &self,
            _inv: &Invocation,
            _args: &str,
        ) -> std::result::Result<(), CommandFailure> {
            Ok(())
        }

        async fn on_ready(&self) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn ready_hooks_run_once_across_reconnects() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut registry = CommandRegistry::new();
        registry
            .add_command(
                Arc::new(BackgroundTask {
                    meta: CommandMeta::new(
                        "digest",
                        Category::Utility,
                        "daily digest",
                        "posts a daily digest",
                    ),
                    fired: fired.clone(),
                }),
                None,
            )
            .unwrap();
        let dispatcher = Dispatcher::new(Arc::new(RwLock::new(registry)));

        let dir = std::env::temp_dir().join(format!("warden-gateway-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let prefixes = Arc::new(RwLock::new(
            PrefixOverrides::load(&dir, "!".to_string()).unwrap(),
        ));
        let bot = WardenBot::new(dispatcher, prefixes, Vec::new());

        bot.fire_ready_hooks().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // A reconnect delivers ready again; the hook must not re-fire.
        bot.fire_ready_hooks().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
