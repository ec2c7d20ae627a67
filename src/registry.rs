//! Two-tier command namespace table.
//!
//! One global partition plus lazily-created per-guild partitions. Lookup
//! always checks the global partition first, so a guild-local name can never
//! shadow a global one; the reverse collision is rejected at registration
//! time. The registry is an explicitly constructed object with no global
//! state; the binary shares it behind `Arc<tokio::sync::RwLock<_>>` because
//! the runtime is multi-threaded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::command::Command;
use crate::context::GuildId;
use crate::error::{RegistryError, Scope};

fn fold(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Default)]
struct Partition {
    /// Every name and alias, case-folded, to its descriptor.
    lookup: HashMap<String, Arc<dyn Command>>,
    /// Canonical names only (no aliases), for enumeration.
    canonical: HashMap<String, Arc<dyn Command>>,
}

impl Partition {
    fn conflict<'a>(&self, keys: &'a [String]) -> Option<&'a String> {
        keys.iter().find(|key| self.lookup.contains_key(*key))
    }

    fn insert(&mut self, keys: &[String], command: Arc<dyn Command>) {
        for key in keys {
            self.lookup.insert(key.clone(), command.clone());
        }
        self.canonical.insert(fold(&command.meta().name), command);
    }

    fn remove(&mut self, command: &Arc<dyn Command>) {
        let meta = command.meta();
        self.lookup.remove(&fold(&meta.name));
        for alias in &meta.aliases {
            self.lookup.remove(&fold(alias));
        }
        self.canonical.remove(&fold(&meta.name));
    }

    fn contains(&self, key: &str) -> bool {
        self.lookup.contains_key(key)
    }
}

/// The namespace table. Owns every registered descriptor.
#[derive(Default)]
pub struct CommandRegistry {
    global: Partition,
    guilds: HashMap<GuildId, Partition>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All case-folded keys a descriptor occupies: its name plus every alias.
    /// Errors if the descriptor collides with itself.
    fn keys_of(command: &Arc<dyn Command>, scope: Scope) -> Result<Vec<String>, RegistryError> {
        let meta = command.meta();
        if meta.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(1 + meta.aliases.len());
        for raw in std::iter::once(&meta.name).chain(meta.aliases.iter()) {
            let key = fold(raw);
            if !seen.insert(key.clone()) {
                return Err(RegistryError::NameTaken { name: key, scope });
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Register a descriptor globally (`guild` is `None`) or locally to one
    /// guild. On any failure nothing is inserted.
    pub fn add_command(
        &mut self,
        command: Arc<dyn Command>,
        guild: Option<GuildId>,
    ) -> Result<(), RegistryError> {
        match guild {
            None => {
                let keys = Self::keys_of(&command, Scope::Global)?;
                if let Some(name) = self.global.conflict(&keys) {
                    return Err(RegistryError::NameTaken {
                        name: name.clone(),
                        scope: Scope::Global,
                    });
                }
                // The global/guild exclusivity invariant cuts both ways: a
                // global name may not already exist in any guild partition.
                for (guild, partition) in &self.guilds {
                    if let Some(name) = partition.conflict(&keys) {
                        return Err(RegistryError::NameTaken {
                            name: name.clone(),
                            scope: Scope::Guild(*guild),
                        });
                    }
                }
                self.global.insert(&keys, command);
            }
            Some(guild) => {
                let keys = Self::keys_of(&command, Scope::Guild(guild))?;
                if let Some(name) = self.global.conflict(&keys) {
                    return Err(RegistryError::NameTaken {
                        name: name.clone(),
                        scope: Scope::Global,
                    });
                }
                if let Some(partition) = self.guilds.get(&guild) {
                    if let Some(name) = partition.conflict(&keys) {
                        return Err(RegistryError::NameTaken {
                            name: name.clone(),
                            scope: Scope::Guild(guild),
                        });
                    }
                }
                self.guilds.entry(guild).or_default().insert(&keys, command);
            }
        }
        Ok(())
    }

    /// Remove the descriptor matching `name` (canonical or alias) from the
    /// named partition, dropping the name and every alias atomically.
    /// Removal never crosses partitions: a global command cannot be removed
    /// "from" a guild, nor a guild-local one as if it were global.
    pub fn remove_command(
        &mut self,
        name: &str,
        guild: Option<GuildId>,
    ) -> Result<Arc<dyn Command>, RegistryError> {
        let key = fold(name);
        match guild {
            None => {
                let command = self.global.lookup.get(&key).cloned().ok_or_else(|| {
                    RegistryError::NotFound {
                        name: name.to_string(),
                        scope: Scope::Global,
                    }
                })?;
                self.global.remove(&command);
                Ok(command)
            }
            Some(guild) => {
                let partition = self
                    .guilds
                    .get_mut(&guild)
                    .ok_or(RegistryError::UnknownGuild { guild })?;
                let command = partition.lookup.get(&key).cloned().ok_or_else(|| {
                    RegistryError::NotFound {
                        name: name.to_string(),
                        scope: Scope::Guild(guild),
                    }
                })?;
                partition.remove(&command);
                if partition.lookup.is_empty() {
                    self.guilds.remove(&guild);
                }
                Ok(command)
            }
        }
    }

    /// Resolve a case-folded name or alias: global partition first, then the
    /// given guild's. Never errors.
    pub fn get(&self, name: &str, guild: Option<GuildId>) -> Option<Arc<dyn Command>> {
        let key = fold(name);
        if let Some(command) = self.global.lookup.get(&key) {
            return Some(command.clone());
        }
        guild
            .and_then(|g| self.guilds.get(&g))
            .and_then(|partition| partition.lookup.get(&key).cloned())
    }

    /// Canonical (alias-free) descriptors visible in a guild: the global set,
    /// optionally unioned with the guild's local set. No ordering guarantee
    /// beyond stable-per-call; callers impose their own.
    pub fn commands_in(&self, guild: Option<GuildId>, include_global: bool) -> Vec<Arc<dyn Command>> {
        let mut out: Vec<Arc<dyn Command>> = if include_global {
            self.global.canonical.values().cloned().collect()
        } else {
            Vec::new()
        };
        if let Some(partition) = guild.and_then(|g| self.guilds.get(&g)) {
            out.extend(partition.canonical.values().cloned());
        }
        out
    }

    /// Every canonical descriptor in every partition.
    pub fn all_commands(&self) -> Vec<Arc<dyn Command>> {
        let mut out: Vec<Arc<dyn Command>> = self.global.canonical.values().cloned().collect();
        for partition in self.guilds.values() {
            out.extend(partition.canonical.values().cloned());
        }
        out
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.global.contains(&fold(name))
    }

    pub fn has_command(&self, name: &str) -> bool {
        let key = fold(name);
        self.global.contains(&key) || self.guilds.values().any(|p| p.contains(&key))
    }

    /// Guilds a command is registered in. Global commands are registered in
    /// every known guild; local commands only where they were added.
    pub fn registered_in(&self, name: &str) -> Vec<GuildId> {
        let key = fold(name);
        if self.global.contains(&key) {
            return self.guilds.keys().copied().collect();
        }
        self.guilds
            .iter()
            .filter(|(_, partition)| partition.contains(&key))
            .map(|(guild, _)| *guild)
            .collect()
    }
}
