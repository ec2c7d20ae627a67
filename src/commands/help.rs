use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::command::{Category, Command, CommandFailure, CommandMeta};
use crate::context::Invocation;
use crate::format::format_maxlen;
use crate::registry::CommandRegistry;

/// Lists the commands visible in the invoking location, or shows one
/// command's long help.
pub struct HelpCommand {
    meta: CommandMeta,
    registry: Arc<RwLock<CommandRegistry>>,
}

impl HelpCommand {
    pub fn new(registry: Arc<RwLock<CommandRegistry>>) -> Self {
        Self {
            meta: CommandMeta::new(
                "help",
                Category::Utility,
                "List commands or show help for one",
                "`help` lists every command you can see here, grouped by category.\n\
                 `help <command>` shows that command's full help.",
            )
            .with_aliases(&["h", "commands"]),
            registry,
        }
    }

    async fn listing(&self, inv: &Invocation) -> String {
        let mut commands = {
            self.registry.read().await.commands_in(inv.guild_id, true)
        };
        // Enumeration order is ours to impose; the table promises nothing.
        commands.sort_by_key(|command| command.meta().name.to_lowercase());

        let mut out = String::from("Available commands:");
        for category in Category::ALL {
            let mut lines = Vec::new();
            for command in &commands {
                if command.meta().category == category {
                    lines.push(format!(
                        "  `{}` - {}",
                        command.meta().name,
                        command.description()
                    ));
                }
            }
            if !lines.is_empty() {
                out.push_str(&format!("\n**{}**\n{}", category, lines.join("\n")));
            }
        }
        out
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    async fn run(&self, inv: &Invocation, args: &str) -> Result<(), CommandFailure> {
        if args.is_empty() {
            let listing = self.listing(inv).await;
            inv.say(&listing).await?;
            return Ok(());
        }

        let (name, rest) = match args.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (args, ""),
        };
        let command = { self.registry.read().await.get(name, inv.guild_id) };
        match command {
            Some(command) => {
                let text = command.help(inv, rest).await;
                inv.say(&text).await?;
                Ok(())
            }
            None => Err(CommandFailure::reportable(format_maxlen(
                "No command named `{}`.",
                &[name],
                Some(crate::format::DISCORD_MESSAGE_LIMIT),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ping::PingCommand;
    use crate::context::testing::{RecordingReplier, ScriptedPrompter, invocation};

    #[tokio::test]
    async fn bare_help_lists_visible_commands() {
        let registry = Arc::new(RwLock::new(CommandRegistry::new()));
        registry
            .write()
            .await
            .add_command(Arc::new(PingCommand::new()), None)
            .unwrap();
        let help = HelpCommand::new(registry.clone());

        let replier = RecordingReplier::new();
        let inv = invocation(None, false, replier.clone(), ScriptedPrompter::new([]));
        help.run(&inv, "").await.unwrap();

        let sent = replier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("**Utility**"));
        assert!(sent[0].contains("`ping` - Check that the bot is alive"));
    }

    #[tokio::test]
    async fn named_help_shows_long_help() {
        let registry = Arc::new(RwLock::new(CommandRegistry::new()));
        registry
            .write()
            .await
            .add_command(Arc::new(PingCommand::new()), None)
            .unwrap();
        let help = HelpCommand::new(registry.clone());

        let replier = RecordingReplier::new();
        let inv = invocation(None, false, replier.clone(), ScriptedPrompter::new([]));
        help.run(&inv, "ping").await.unwrap();
        assert_eq!(replier.sent(), vec!["Replies with `Pong!`. No arguments.".to_string()]);
    }

    #[tokio::test]
    async fn unknown_name_is_a_reportable_failure() {
        let registry = Arc::new(RwLock::new(CommandRegistry::new()));
        let help = HelpCommand::new(registry);

        let replier = RecordingReplier::new();
        let inv = invocation(None, false, replier.clone(), ScriptedPrompter::new([]));
        let err = help.run(&inv, "nosuch").await.unwrap_err();
        assert!(matches!(err, CommandFailure::Reportable { .. }));
        assert!(replier.sent().is_empty());
    }
}
