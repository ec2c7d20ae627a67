use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::command::{Category, Command, CommandFailure, CommandMeta};
use crate::context::{GuildId, Invocation, PromptReply, UserId};
use crate::format::format_maxlen;
use crate::store::JsonStore;

const CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

lazy_static! {
    static ref USER_MENTION_RE: Regex = Regex::new(r"^<@!?(\d+)>$").unwrap();
}

/// One recorded warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarnEntry {
    pub reason: String,
    pub moderator: u64,
    pub issued_at: DateTime<Utc>,
}

/// Warn log store shape: `"guild:user"` to that user's warnings, oldest
/// first.
pub type WarnLog = HashMap<String, Vec<WarnEntry>>;

fn log_key(guild: GuildId, user: UserId) -> String {
    format!("{}:{}", guild, user)
}

fn parse_user_mention(token: &str) -> Option<UserId> {
    USER_MENTION_RE
        .captures(token)
        .and_then(|captures| captures[1].parse().ok())
        .map(UserId)
}

/// Records, lists, and clears warnings against users. Moderators only.
pub struct WarnCommand {
    meta: CommandMeta,
    store: Arc<RwLock<JsonStore<WarnLog>>>,
}

impl WarnCommand {
    pub fn new(store: Arc<RwLock<JsonStore<WarnLog>>>) -> Self {
        Self {
            meta: CommandMeta::new(
                "warn",
                Category::Moderation,
                "Warn a user, or manage their warnings",
                "`warn <@user> <reason>` records a warning.\n\
                 `warn list <@user>` shows a user's warnings.\n\
                 `warn clear <@user>` deletes them, after confirmation.",
            )
            .with_aliases(&["warnings"]),
            store,
        }
    }

    fn usage() -> CommandFailure {
        CommandFailure::reportable(
            "Usage: `warn <@user> <reason>`, `warn list <@user>` or `warn clear <@user>`",
        )
    }

    async fn add(
        &self,
        inv: &Invocation,
        guild: GuildId,
        target: UserId,
        reason: &str,
    ) -> Result<(), CommandFailure> {
        if reason.is_empty() {
            return Err(CommandFailure::reportable(
                "A warning needs a reason: `warn <@user> <reason>`",
            ));
        }
        let entry = WarnEntry {
            reason: reason.to_string(),
            moderator: inv.author.id.0,
            issued_at: Utc::now(),
        };
        let total = self
            .store
            .write()
            .await
            .update(|log| {
                let entries = log.entry(log_key(guild, target)).or_default();
                entries.push(entry);
                entries.len()
            })
            .context("persisting warn log")?;
        inv.say(&format_maxlen(
            "Warned <@{}> ({} warning(s) on record).",
            &[&target.to_string(), &total.to_string()],
            None,
        ))
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        inv: &Invocation,
        guild: GuildId,
        target: UserId,
    ) -> Result<(), CommandFailure> {
        let lines = {
            let store = self.store.read().await;
            match store.get().get(&log_key(guild, target)) {
                None => Vec::new(),
                Some(entries) => entries
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| {
                        format!(
                            "{}. {} - {} (by <@{}>)",
                            i + 1,
                            entry.issued_at.format("%Y-%m-%d %H:%M UTC"),
                            entry.reason,
                            entry.moderator
                        )
                    })
                    .collect(),
            }
        };
        if lines.is_empty() {
            inv.say(&format_maxlen(
                "<@{}> has no warnings on record.",
                &[&target.to_string()],
                None,
            ))
            .await?;
        } else {
            inv.say(&format_maxlen(
                "Warnings for <@{}>:\n{}",
                &[&target.to_string(), &lines.join("\n")],
                Some(crate::format::DISCORD_MESSAGE_LIMIT),
            ))
            .await?;
        }
        Ok(())
    }

    async fn clear(
        &self,
        inv: &Invocation,
        guild: GuildId,
        target: UserId,
    ) -> Result<(), CommandFailure> {
        let count = {
            let store = self.store.read().await;
            store
                .get()
                .get(&log_key(guild, target))
                .map(Vec::len)
                .unwrap_or(0)
        };
        if count == 0 {
            return Err(CommandFailure::reportable(format_maxlen(
                "<@{}> has no warnings to clear.",
                &[&target.to_string()],
                None,
            )));
        }

        inv.say(&format_maxlen(
            "About to clear {} warning(s) for <@{}>. Reply `yes` to confirm or `cancel` to abort.",
            &[&count.to_string(), &target.to_string()],
            None,
        ))
        .await?;

        match inv.prompter.next_reply(CONFIRM_TIMEOUT).await {
            PromptReply::Message(reply) if reply.trim().eq_ignore_ascii_case("yes") => {
                self.store
                    .write()
                    .await
                    .update(|log| {
                        log.remove(&log_key(guild, target));
                    })
                    .context("persisting warn log")?;
                inv.say(&format_maxlen(
                    "Cleared {} warning(s) for <@{}>.",
                    &[&count.to_string(), &target.to_string()],
                    None,
                ))
                .await?;
                Ok(())
            }
            PromptReply::Message(_) => Err(CommandFailure::reportable(
                "Confirmation not understood; nothing was cleared.",
            )),
            PromptReply::Cancelled => Err(CommandFailure::cancelled()),
            PromptReply::TimedOut => Err(CommandFailure::reportable(
                "No response; nothing was cleared.",
            )),
        }
    }
}

#[async_trait]
impl Command for WarnCommand {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    async fn can_run(&self, inv: &Invocation) -> anyhow::Result<bool> {
        Ok(inv.author.elevated)
    }

    async fn run(&self, inv: &Invocation, args: &str) -> Result<(), CommandFailure> {
        let guild = inv
            .guild_id
            .ok_or_else(|| CommandFailure::reportable("Warnings only exist in a server."))?;

        let (first, rest) = match args.split_once(char::is_whitespace) {
            Some((first, rest)) => (first, rest.trim()),
            None => (args, ""),
        };

        match first {
            "" => Err(Self::usage()),
            "list" => {
                let target = parse_user_mention(rest).ok_or_else(Self::usage)?;
                self.list(inv, guild, target).await
            }
            "clear" => {
                let target = parse_user_mention(rest).ok_or_else(Self::usage)?;
                self.clear(inv, guild, target).await
            }
            mention => {
                let target = parse_user_mention(mention).ok_or_else(Self::usage)?;
                self.add(inv, guild, target, rest).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::context::testing::{RecordingReplier, ScriptedPrompter, invocation};

    fn store() -> Arc<RwLock<JsonStore<WarnLog>>> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static SCRATCH: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "warden-warn-{}-{}.json",
            std::process::id(),
            SCRATCH.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(RwLock::new(JsonStore::load(path).unwrap()))
    }

    #[tokio::test]
    async fn permission_gate_requires_elevation() {
        let command = WarnCommand::new(store());
        let replier = RecordingReplier::new();

        let plain = invocation(Some(1), false, replier.clone(), ScriptedPrompter::new([]));
        assert!(!command.can_run(&plain).await.unwrap());

        let moderator = invocation(Some(1), true, replier, ScriptedPrompter::new([]));
        assert!(command.can_run(&moderator).await.unwrap());
    }

    #[tokio::test]
    async fn warn_records_and_lists_entries() {
        let warns = store();
        let command = WarnCommand::new(warns.clone());
        let replier = RecordingReplier::new();
        let inv = invocation(Some(1), true, replier.clone(), ScriptedPrompter::new([]));

        command.run(&inv, "<@42> Spamming links").await.unwrap();
        command.run(&inv, "<@42> Still spamming").await.unwrap();
        command.run(&inv, "list <@42>").await.unwrap();

        let sent = replier.sent();
        assert_eq!(sent[0], "Warned <@42> (1 warning(s) on record).");
        assert_eq!(sent[1], "Warned <@42> (2 warning(s) on record).");
        assert!(sent[2].contains("- Spamming links (by <@7>)"));
        assert!(sent[2].contains("- Still spamming (by <@7>)"));

        assert_eq!(warns.read().await.get().get("1:42").map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn warnings_are_scoped_per_guild() {
        let command = WarnCommand::new(store());
        let replier = RecordingReplier::new();

        let here = invocation(Some(1), true, replier.clone(), ScriptedPrompter::new([]));
        command.run(&here, "<@42> rude").await.unwrap();

        let elsewhere = invocation(Some(2), true, replier.clone(), ScriptedPrompter::new([]));
        command.run(&elsewhere, "list <@42>").await.unwrap();
        assert_eq!(
            replier.sent().last().unwrap(),
            "<@42> has no warnings on record."
        );
    }

    #[tokio::test]
    async fn bad_input_is_reportable() {
        let command = WarnCommand::new(store());
        let replier = RecordingReplier::new();
        let inv = invocation(Some(1), true, replier.clone(), ScriptedPrompter::new([]));

        for args in ["", "notamention reason", "<@42>", "list notamention"] {
            let err = command.run(&inv, args).await.unwrap_err();
            assert!(matches!(err, CommandFailure::Reportable { .. }), "args: {args}");
        }

        let dm = invocation(None, true, replier, ScriptedPrompter::new([]));
        let err = command.run(&dm, "<@42> rude").await.unwrap_err();
        assert!(matches!(err, CommandFailure::Reportable { .. }));
    }

    #[tokio::test]
    async fn clear_asks_for_confirmation_first() {
        let warns = store();
        let command = WarnCommand::new(warns.clone());
        let replier = RecordingReplier::new();

        let seed = invocation(Some(1), true, replier.clone(), ScriptedPrompter::new([]));
        command.run(&seed, "<@42> rude").await.unwrap();

        let confirming = invocation(
            Some(1),
            true,
            replier.clone(),
            ScriptedPrompter::new([PromptReply::Message("yes".to_string())]),
        );
        command.run(&confirming, "clear <@42>").await.unwrap();

        assert!(warns.read().await.get().get("1:42").is_none());
        assert_eq!(
            replier.sent().last().unwrap(),
            "Cleared 1 warning(s) for <@42>."
        );
    }

    #[tokio::test]
    async fn clear_cancellation_surfaces_as_cancelled() {
        let warns = store();
        let command = WarnCommand::new(warns.clone());
        let replier = RecordingReplier::new();

        let seed = invocation(Some(1), true, replier.clone(), ScriptedPrompter::new([]));
        command.run(&seed, "<@42> rude").await.unwrap();

        let cancelling = invocation(
            Some(1),
            true,
            replier.clone(),
            ScriptedPrompter::new([PromptReply::Cancelled]),
        );
        let err = command.run(&cancelling, "clear <@42>").await.unwrap_err();
        assert!(matches!(err, CommandFailure::Cancelled { .. }));

        // Nothing was cleared.
        assert_eq!(warns.read().await.get().get("1:42").map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn clear_timeout_is_an_explicit_no_response_outcome() {
        let warns = store();
        let command = WarnCommand::new(warns.clone());
        let replier = RecordingReplier::new();

        let seed = invocation(Some(1), true, replier.clone(), ScriptedPrompter::new([]));
        command.run(&seed, "<@42> rude").await.unwrap();

        let silent = invocation(Some(1), true, replier, ScriptedPrompter::new([]));
        let err = command.run(&silent, "clear <@42>").await.unwrap_err();
        assert!(matches!(err, CommandFailure::Reportable { .. }));
        assert_eq!(warns.read().await.get().get("1:42").map(Vec::len), Some(1));
    }
}
