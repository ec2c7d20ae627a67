//! Warden - Discord moderation/utility bot
//!
//! The heart of the crate is a two-tier command namespace table
//! ([`registry::CommandRegistry`]) and the dispatcher that resolves,
//! permission-checks, and runs commands against it, translating every
//! failure into exactly one bounded user-facing notice. Everything else is
//! glue: a serenity gateway adapter, flat JSON persistence, and a handful of
//! built-in commands.

pub mod command;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod gateway;
pub mod registry;
pub mod store;

pub use command::{Category, Command, CommandFailure, CommandMeta};
pub use config::{Config, PrefixOverrides};
pub use context::{
    Author, ChannelId, GuildId, Invocation, PromptReply, Prompter, Replier, UserId,
};
pub use dispatch::{Dispatch, Dispatcher, parse_command};
pub use error::{BotError, ConfigError, RegistryError, Result, Scope, StoreError};
pub use gateway::{WardenBot, run_bot};
pub use registry::CommandRegistry;
pub use store::JsonStore;

// Re-export serenity for convenience
pub use serenity;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        Author, BotError, Category, ChannelId, Command, CommandFailure, CommandMeta,
        CommandRegistry, Config, Dispatch, Dispatcher, GuildId, Invocation, JsonStore,
        PrefixOverrides, PromptReply, Prompter, RegistryError, Replier, Result, UserId,
    };
}
