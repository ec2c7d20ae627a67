//! The command descriptor contract: one implementor per invocable command,
//! carrying its metadata as data rather than overridden attributes.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::Invocation;

/// Help-listing group for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Utility,
    Moderation,
    Configuration,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Utility,
        Category::Moderation,
        Category::Configuration,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utility => write!(f, "Utility"),
            Self::Moderation => write!(f, "Moderation"),
            Self::Configuration => write!(f, "Configuration"),
        }
    }
}

/// Descriptor metadata. `name` keeps its original case for display; all
/// lookups case-fold.
#[derive(Debug, Clone)]
pub struct CommandMeta {
    pub name: String,
    pub aliases: Vec<String>,
    pub category: Category,
    pub short_help: String,
    pub long_help: String,
}

impl CommandMeta {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        short_help: impl Into<String>,
        long_help: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            category,
            short_help: short_help.into(),
            long_help: long_help.into(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// How a command's `run` signals failure. Mirrors the dispatcher's error
/// taxonomy: each variant gets a distinct recovery path, and commands are
/// expected to raise rather than handle their own expected failures.
#[derive(Error, Debug)]
pub enum CommandFailure {
    /// The user explicitly aborted a multi-step prompt.
    #[error("cancelled by user")]
    Cancelled { loggable: bool },

    /// A deliberate, user-facing failure condition (bad input, missing
    /// resource). The message is shown to the user verbatim.
    #[error("{message}")]
    Reportable { message: String, loggable: bool },

    /// Anything else. Always logged with its cause chain, surfaced to the
    /// user as a generic opaque notice, and escalated.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl CommandFailure {
    pub fn reportable(message: impl Into<String>) -> Self {
        Self::Reportable {
            message: message.into(),
            loggable: false,
        }
    }

    pub fn reportable_logged(message: impl Into<String>) -> Self {
        Self::Reportable {
            message: message.into(),
            loggable: true,
        }
    }

    pub fn cancelled() -> Self {
        Self::Cancelled { loggable: false }
    }
}

impl fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.meta().name)
            .finish_non_exhaustive()
    }
}

/// One invocable command. Registered once at startup (or dynamically for
/// admin-created commands) and never mutated afterwards except for state the
/// implementor owns itself.
#[async_trait]
pub trait Command: Send + Sync {
    fn meta(&self) -> &CommandMeta;

    /// Perform the command's effect. The raw trailing-argument string is
    /// passed verbatim with surrounding whitespace stripped.
    async fn run(&self, inv: &Invocation, args: &str) -> Result<(), CommandFailure>;

    /// Permission predicate, queried by the dispatcher before every
    /// invocation. An `Err` is treated as a denial (fail-closed), never as
    /// permission granted.
    async fn can_run(&self, _inv: &Invocation) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// Descriptive help text, possibly specialized per user or argument.
    async fn help(&self, _inv: &Invocation, _args: &str) -> String {
        self.meta().long_help.clone()
    }

    /// One-line summary for listings.
    fn description(&self) -> &str {
        &self.meta().short_help
    }

    /// Invoked exactly once when the gateway signals readiness. Background
    /// tasks belong here.
    async fn on_ready(&self) {}
}
