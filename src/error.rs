use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::context::GuildId;

/// The partition a name was (or would be) registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Guild(GuildId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "globally"),
            Self::Guild(guild) => write!(f, "in guild {}", guild),
        }
    }
}

/// Failures mutating or resolving the command namespace table. Registration
/// failures are atomic: nothing is inserted on error.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("command name cannot be empty")]
    #[diagnostic(
        code(warden::registry::empty_name),
        help("every command needs a non-empty, case-insensitive name")
    )]
    EmptyName,

    #[error("name or alias '{name}' is already registered {scope}")]
    #[diagnostic(
        code(warden::registry::name_taken),
        help("names and aliases are case-insensitive and unique within their scope; guild-local names may not shadow global ones")
    )]
    NameTaken { name: String, scope: Scope },

    #[error("guild {guild} has no local commands")]
    #[diagnostic(code(warden::registry::unknown_guild))]
    UnknownGuild { guild: GuildId },

    #[error("no command named '{name}' {scope}")]
    #[diagnostic(
        code(warden::registry::not_found),
        help("removal only searches the partition named by the guild argument; a global command cannot be removed 'from' a guild")
    )]
    NotFound { name: String, scope: Scope },
}

/// Errors escalated past the dispatcher boundary. Everything here has
/// already produced its single user-facing notice; escalation exists for
/// upstream logging and the process-level handler.
#[derive(Error, Diagnostic, Debug)]
pub enum BotError {
    #[error("command '{command}' failed unexpectedly")]
    #[diagnostic(
        code(warden::dispatch::command_failed),
        help("this is a bug in the command implementation; see the cause chain")
    )]
    CommandFailed {
        command: String,
        cause: anyhow::Error,
    },

    #[error("command '{command}' cancelled by {user}")]
    #[diagnostic(code(warden::dispatch::cancelled))]
    CommandCancelled { command: String, user: String },

    #[error("command '{command}' reported: {message}")]
    #[diagnostic(code(warden::dispatch::reported))]
    CommandReported { command: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error("discord gateway error")]
    #[diagnostic(
        code(warden::gateway),
        help("check the bot token and that the message content intent is enabled")
    )]
    Gateway(#[source] serenity::Error),
}

/// Failures reading or writing a flat JSON store.
#[derive(Error, Diagnostic, Debug)]
pub enum StoreError {
    #[error("failed to read store file {path}")]
    #[diagnostic(code(warden::store::read_failed))]
    ReadFailed {
        path: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to write store file {path}")]
    #[diagnostic(code(warden::store::write_failed))]
    WriteFailed {
        path: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("store file {path} is not valid JSON")]
    #[diagnostic(
        code(warden::store::corrupt),
        help("fix or delete the file; a missing file starts empty")
    )]
    Corrupt {
        path: String,
        #[source]
        cause: serde_json::Error,
    },

    #[error("failed to encode store file {path}")]
    #[diagnostic(code(warden::store::encode_failed))]
    EncodeFailed {
        path: String,
        #[source]
        cause: serde_json::Error,
    },
}

/// Configuration loading failures.
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("config file not found at {path}")]
    #[diagnostic(
        code(warden::config::not_found),
        help("create the file or point WARDEN_CONFIG at an existing one")
    )]
    NotFound { path: String },

    #[error("failed to parse config file")]
    #[diagnostic(code(warden::config::parse_failed))]
    ParseFailed {
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {field}: {reason}")]
    #[diagnostic(code(warden::config::invalid))]
    Invalid { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, BotError>;
