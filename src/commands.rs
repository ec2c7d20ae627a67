//! Built-in commands. The set is a static registration list built at
//! startup, so the available commands are verifiable without scanning
//! anything at runtime.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::command::Command;
use crate::config::PrefixOverrides;
use crate::registry::CommandRegistry;
use crate::store::JsonStore;

pub mod help;
pub mod ping;
pub mod prefix;
pub mod warn;

pub use help::HelpCommand;
pub use ping::PingCommand;
pub use prefix::PrefixCommand;
pub use warn::{WarnCommand, WarnEntry, WarnLog};

/// Every built-in command, ready to be registered globally.
pub fn builtin_commands(
    registry: Arc<RwLock<CommandRegistry>>,
    prefixes: Arc<RwLock<PrefixOverrides>>,
    warns: Arc<RwLock<JsonStore<WarnLog>>>,
) -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(PingCommand::new()),
        Arc::new(HelpCommand::new(registry)),
        Arc::new(PrefixCommand::new(prefixes)),
        Arc::new(WarnCommand::new(warns)),
    ]
}
