use async_trait::async_trait;

use crate::command::{Category, Command, CommandFailure, CommandMeta};
use crate::context::Invocation;

/// Liveness check.
pub struct PingCommand {
    meta: CommandMeta,
}

impl PingCommand {
    pub fn new() -> Self {
        Self {
            meta: CommandMeta::new(
                "ping",
                Category::Utility,
                "Check that the bot is alive",
                "Replies with `Pong!`. No arguments.",
            ),
        }
    }
}

impl Default for PingCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command for PingCommand {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    async fn run(&self, inv: &Invocation, _args: &str) -> Result<(), CommandFailure> {
        inv.say("Pong!").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::context::testing::{RecordingReplier, ScriptedPrompter, invocation};

    #[tokio::test]
    async fn replies_pong() {
        let replier = RecordingReplier::new();
        let inv = invocation(None, false, replier.clone(), ScriptedPrompter::new([]));
        PingCommand::new().run(&inv, "").await.unwrap();
        assert_eq!(replier.sent(), vec!["Pong!".to_string()]);
    }
}
