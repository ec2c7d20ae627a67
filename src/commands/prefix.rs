use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::command::{Category, Command, CommandFailure, CommandMeta};
use crate::config::PrefixOverrides;
use crate::context::Invocation;
use crate::format::{format_maxlen, len_utf16};

const MAX_PREFIX_LEN: usize = 8;

/// Shows or changes the guild's invocation prefix.
pub struct PrefixCommand {
    meta: CommandMeta,
    prefixes: Arc<RwLock<PrefixOverrides>>,
}

impl PrefixCommand {
    pub fn new(prefixes: Arc<RwLock<PrefixOverrides>>) -> Self {
        Self {
            meta: CommandMeta::new(
                "prefix",
                Category::Configuration,
                "Show or change the command prefix",
                "`prefix` shows the prefix used here.\n\
                 `prefix set <p>` overrides it for this server (moderators only).\n\
                 `prefix reset` goes back to the default (moderators only).",
            ),
            prefixes,
        }
    }

    fn require_elevated(inv: &Invocation) -> Result<(), CommandFailure> {
        if inv.author.elevated {
            Ok(())
        } else {
            Err(CommandFailure::reportable(
                "Changing the prefix needs moderator permissions.",
            ))
        }
    }

    fn require_guild(inv: &Invocation) -> Result<crate::context::GuildId, CommandFailure> {
        inv.guild_id.ok_or_else(|| {
            CommandFailure::reportable("The prefix can only be changed in a server.")
        })
    }
}

#[async_trait]
impl Command for PrefixCommand {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    async fn run(&self, inv: &Invocation, args: &str) -> Result<(), CommandFailure> {
        let (verb, rest) = match args.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (args, ""),
        };

        match verb {
            "" | "show" => {
                let current = {
                    self.prefixes.read().await.prefix_for(inv.guild_id).to_string()
                };
                inv.say(&format_maxlen(
                    "The prefix here is `{}`.",
                    &[&current],
                    None,
                ))
                .await?;
                Ok(())
            }
            "set" => {
                let guild = Self::require_guild(inv)?;
                Self::require_elevated(inv)?;
                if rest.is_empty() {
                    return Err(CommandFailure::reportable("Usage: `prefix set <prefix>`"));
                }
                if rest.chars().any(char::is_whitespace) {
                    return Err(CommandFailure::reportable(
                        "The prefix cannot contain whitespace.",
                    ));
                }
                if len_utf16(rest) > MAX_PREFIX_LEN {
                    return Err(CommandFailure::reportable(format!(
                        "The prefix can be at most {} characters.",
                        MAX_PREFIX_LEN
                    )));
                }
                self.prefixes
                    .write()
                    .await
                    .set(guild, rest.to_string())
                    .context("persisting prefix override")?;
                inv.say(&format_maxlen("Prefix set to `{}`.", &[rest], None))
                    .await?;
                Ok(())
            }
            "reset" => {
                let guild = Self::require_guild(inv)?;
                Self::require_elevated(inv)?;
                let (was_set, default) = {
                    let mut prefixes = self.prefixes.write().await;
                    let was_set = prefixes
                        .reset(guild)
                        .context("persisting prefix override")?;
                    (was_set, prefixes.default_prefix().to_string())
                };
                let notice = if was_set {
                    format_maxlen("Prefix reset to the default `{}`.", &[&default], None)
                } else {
                    format_maxlen("No override was set; the prefix is `{}`.", &[&default], None)
                };
                inv.say(&notice).await?;
                Ok(())
            }
            other => Err(CommandFailure::reportable(format_maxlen(
                "Unknown subcommand `{}`. Try `prefix`, `prefix set <p>` or `prefix reset`.",
                &[other],
                Some(crate::format::DISCORD_MESSAGE_LIMIT),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::context::GuildId;
    use crate::context::testing::{RecordingReplier, ScriptedPrompter, invocation};

    fn overrides() -> Arc<RwLock<PrefixOverrides>> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static SCRATCH: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "warden-prefix-cmd-{}-{}",
            std::process::id(),
            SCRATCH.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(RwLock::new(
            PrefixOverrides::load(&dir, "!".to_string()).unwrap(),
        ))
    }

    #[tokio::test]
    async fn shows_the_effective_prefix() {
        let command = PrefixCommand::new(overrides());
        let replier = RecordingReplier::new();
        let inv = invocation(Some(1), false, replier.clone(), ScriptedPrompter::new([]));
        command.run(&inv, "").await.unwrap();
        assert_eq!(replier.sent(), vec!["The prefix here is `!`.".to_string()]);
    }

    #[tokio::test]
    async fn set_requires_elevation() {
        let command = PrefixCommand::new(overrides());
        let replier = RecordingReplier::new();
        let inv = invocation(Some(1), false, replier.clone(), ScriptedPrompter::new([]));
        let err = command.run(&inv, "set ?").await.unwrap_err();
        assert!(matches!(err, CommandFailure::Reportable { .. }));
    }

    #[tokio::test]
    async fn set_requires_a_guild() {
        let command = PrefixCommand::new(overrides());
        let replier = RecordingReplier::new();
        let inv = invocation(None, true, replier.clone(), ScriptedPrompter::new([]));
        let err = command.run(&inv, "set ?").await.unwrap_err();
        assert!(matches!(err, CommandFailure::Reportable { .. }));
    }

    #[tokio::test]
    async fn set_and_reset_round_trip() {
        let prefixes = overrides();
        let command = PrefixCommand::new(prefixes.clone());
        let replier = RecordingReplier::new();
        let inv = invocation(Some(1), true, replier.clone(), ScriptedPrompter::new([]));

        command.run(&inv, "set ?").await.unwrap();
        assert_eq!(
            prefixes.read().await.prefix_for(Some(GuildId(1))),
            "?"
        );

        command.run(&inv, "reset").await.unwrap();
        assert_eq!(
            prefixes.read().await.prefix_for(Some(GuildId(1))),
            "!"
        );
        assert_eq!(
            replier.sent(),
            vec![
                "Prefix set to `?`.".to_string(),
                "Prefix reset to the default `!`.".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn rejects_bad_prefixes() {
        let command = PrefixCommand::new(overrides());
        let replier = RecordingReplier::new();
        let inv = invocation(Some(1), true, replier.clone(), ScriptedPrompter::new([]));

        assert!(command.run(&inv, "set").await.is_err());
        assert!(command.run(&inv, "set toolongprefix").await.is_err());
        assert!(command.run(&inv, "bogus").await.is_err());
    }
}
