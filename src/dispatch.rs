//! Resolution and dispatch of incoming candidate command invocations.
//!
//! One pass per message: resolve the leading token against the registry,
//! query the permission predicate (fail-closed), invoke, and translate every
//! failure into exactly one bounded user-facing notice plus a log record.
//! All recovery happens here; commands raise rather than handle their own
//! expected failures.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::command::CommandFailure;
use crate::context::{Invocation, UserId};
use crate::error::{BotError, Result};
use crate::format::{DISCORD_MESSAGE_LIMIT, bound_str, format_maxlen, sanitize_inline};
use crate::registry::CommandRegistry;

lazy_static! {
    /// Leading bot mention: `<@id>` or `<@!id>`, with trailing whitespace.
    static ref MENTION_RE: Regex = Regex::new(r"^<@!?(\d+)>\s*").unwrap();
}

/// Extract `(case-folded name, raw args)` from a message that starts with
/// the invocation prefix or an at-mention of the bot. Returns `None` for
/// anything that is not a candidate command invocation.
pub fn parse_command(content: &str, prefix: &str, bot_id: UserId) -> Option<(String, String)> {
    let content = content.trim_start();
    let rest = if let Some(stripped) = content.strip_prefix(prefix) {
        stripped
    } else {
        let captures = MENTION_RE.captures(content)?;
        if captures[1].parse::<u64>().ok()? != bot_id.0 {
            return None;
        }
        &content[captures.get(0)?.end()..]
    };

    let rest = rest.trim_start();
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest.trim_end(), ""),
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.to_string()))
}

/// Terminal state of one dispatch that was recovered locally. Escalated
/// failures come back as `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Completed,
    UnknownCommand,
    Denied,
    Cancelled,
    Reported,
}

/// Resolves, permission-checks, and runs commands against the injected
/// registry. Borrows descriptors only for the duration of one dispatch.
pub struct Dispatcher {
    registry: Arc<RwLock<CommandRegistry>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<RwLock<CommandRegistry>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RwLock<CommandRegistry>> {
        &self.registry
    }

    /// `raw` is the message content exactly as received, kept for log
    /// records; `name` and `args` are the parsed invocation pieces.
    pub async fn dispatch(
        &self,
        inv: &Invocation,
        name: &str,
        args: &str,
        raw: &str,
    ) -> Result<Dispatch> {
        let command = { self.registry.read().await.get(name, inv.guild_id) };
        let Some(command) = command else {
            info!(command = %name, user = %inv.author.id, "unknown command");
            self.notify(
                inv,
                &format_maxlen("Unknown command `{}`.", &[name], Some(DISCORD_MESSAGE_LIMIT)),
            )
            .await;
            return Ok(Dispatch::UnknownCommand);
        };
        let display_name = command.meta().name.clone();

        match command.can_run(inv).await {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    command = %display_name,
                    user = %inv.author.id,
                    content = %sanitize_inline(raw),
                    "permission denied"
                );
                self.deny_notice(inv, &display_name).await;
                return Ok(Dispatch::Denied);
            }
            Err(cause) => {
                // Fail closed, but keep this distinguishable from a plain
                // denial in the logs.
                warn!(
                    command = %display_name,
                    user = %inv.author.id,
                    cause = ?cause,
                    "permission check errored; treating as denied"
                );
                self.deny_notice(inv, &display_name).await;
                return Ok(Dispatch::Denied);
            }
        }

        match command.run(inv, args).await {
            Ok(()) => {
                info!(
                    command = %display_name,
                    user = %inv.author.id,
                    args = %sanitize_inline(args),
                    "command called"
                );
                Ok(Dispatch::Completed)
            }
            Err(CommandFailure::Cancelled { loggable }) => {
                self.notify(
                    inv,
                    &format_maxlen(
                        "{}: `{}` cancelled.",
                        &[&inv.author.name, &display_name],
                        Some(DISCORD_MESSAGE_LIMIT),
                    ),
                )
                .await;
                if loggable {
                    Err(BotError::CommandCancelled {
                        command: display_name,
                        user: inv.author.name.clone(),
                    })
                } else {
                    Ok(Dispatch::Cancelled)
                }
            }
            Err(CommandFailure::Reportable { message, loggable }) => {
                self.notify(inv, &bound_str(&message, DISCORD_MESSAGE_LIMIT)).await;
                if loggable {
                    warn!(command = %display_name, message = %message, "command reported a failure");
                    Err(BotError::CommandReported {
                        command: display_name,
                        message,
                    })
                } else {
                    Ok(Dispatch::Reported)
                }
            }
            Err(CommandFailure::Unexpected(cause)) => {
                error!(command = %display_name, cause = ?cause, "command failed unexpectedly");
                self.notify(
                    inv,
                    &format_maxlen(
                        "An internal error occured while executing `{}`",
                        &[&display_name],
                        Some(DISCORD_MESSAGE_LIMIT),
                    ),
                )
                .await;
                Err(BotError::CommandFailed {
                    command: display_name,
                    cause,
                })
            }
        }
    }

    async fn deny_notice(&self, inv: &Invocation, command: &str) {
        self.notify(
            inv,
            &format_maxlen(
                "You don't have permission to run `{}`.",
                &[command],
                Some(DISCORD_MESSAGE_LIMIT),
            ),
        )
        .await;
    }

    /// Notice delivery is fault-tolerant: a failed send is logged and
    /// swallowed so it never masks the outcome being reported.
    async fn notify(&self, inv: &Invocation, text: &str) {
        let bounded = bound_str(text, DISCORD_MESSAGE_LIMIT);
        if let Err(cause) = inv.replier.send(&bounded).await {
            warn!(channel = %inv.channel_id, cause = ?cause, "failed to deliver notice");
        }
    }
}
