//! Configuration: a TOML file with environment-variable overrides, plus the
//! per-guild prefix overlay persisted alongside the other JSON stores.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::GuildId;
use crate::error::{ConfigError, StoreError};
use crate::store::JsonStore;

fn default_prefix() -> String {
    "!".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

/// Main configuration for warden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Discord connection settings
    pub discord: DiscordConfig,
    /// Bot behavior settings
    #[serde(default)]
    pub bot: BotSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Discord bot token
    pub token: String,
    /// Discord application ID
    pub application_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Global fallback invocation prefix; guilds can override it.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// User IDs always treated as elevated, in any location.
    #[serde(default)]
    pub admin_users: Vec<u64>,
    /// Directory holding the flat JSON stores.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            admin_users: Vec::new(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new(),
                application_id: None,
            },
            bot: BotSettings::default(),
        }
    }
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.token.is_empty() {
            return Err(ConfigError::Invalid {
                field: "discord.token".to_string(),
                reason: "token cannot be empty (set DISCORD_TOKEN or discord.token)".to_string(),
            });
        }
        if self.bot.prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "bot.prefix".to_string(),
                reason: "prefix cannot be empty".to_string(),
            });
        }
        if self.bot.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "bot.prefix".to_string(),
                reason: "prefix cannot contain whitespace".to_string(),
            });
        }
        Ok(())
    }

    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = env::var("WARDEN_CONFIG").unwrap_or_else(|_| "warden.toml".to_string());

        if Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|_e| {
                ConfigError::NotFound {
                    path: config_path.clone(),
                }
            })?;
            let config: Config =
                toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed { source: e })?;
            Ok(config.override_from_env())
        } else {
            Ok(Self::default().override_from_env())
        }
    }

    /// Override config values with environment variables.
    fn override_from_env(mut self) -> Self {
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Ok(app_id) = env::var("APP_ID") {
            if let Ok(id) = app_id.parse() {
                self.discord.application_id = Some(id);
            }
        }
        if let Ok(prefix) = env::var("WARDEN_PREFIX") {
            self.bot.prefix = prefix;
        }
        if let Ok(dir) = env::var("WARDEN_DATA_DIR") {
            self.bot.data_dir = dir;
        }
        self
    }
}

/// Helper to load a dotenv file if it exists.
pub fn load_dotenv() {
    if let Ok(path) = env::var("DOTENV_PATH") {
        dotenvy::from_path(&path).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

/// Per-guild invocation prefixes over the global default, persisted as one
/// JSON store.
pub struct PrefixOverrides {
    default: String,
    store: JsonStore<HashMap<u64, String>>,
}

impl PrefixOverrides {
    pub fn load(data_dir: &Path, default: String) -> Result<Self, StoreError> {
        Ok(Self {
            default,
            store: JsonStore::load(data_dir.join("prefixes.json"))?,
        })
    }

    /// Effective prefix for a location. DMs always use the global default.
    pub fn prefix_for(&self, guild: Option<GuildId>) -> &str {
        guild
            .and_then(|g| self.store.get().get(&g.0))
            .map(String::as_str)
            .unwrap_or(&self.default)
    }

    pub fn default_prefix(&self) -> &str {
        &self.default
    }

    pub fn set(&mut self, guild: GuildId, prefix: String) -> Result<(), StoreError> {
        self.store.update(|overrides| {
            overrides.insert(guild.0, prefix);
        })
    }

    /// Drop a guild's override. Returns whether one was set.
    pub fn reset(&mut self, guild: GuildId) -> Result<bool, StoreError> {
        self.store
            .update(|overrides| overrides.remove(&guild.0).is_some())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [discord]
            token = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.discord.token, "abc");
        assert_eq!(config.bot.prefix, "!");
        assert_eq!(config.bot.data_dir, "data");
        assert!(config.bot.admin_users.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
            [discord]
            token = "abc"
            application_id = 123

            [bot]
            prefix = "?"
            admin_users = [1, 2]
            data_dir = "/var/lib/warden"
            "#,
        )
        .unwrap();
        assert_eq!(config.discord.application_id, Some(123));
        assert_eq!(config.bot.prefix, "?");
        assert_eq!(config.bot.admin_users, vec![1, 2]);
    }

    #[test]
    fn rejects_empty_token_and_bad_prefixes() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.discord.token = "abc".to_string();
        config.bot.prefix = String::new();
        assert!(config.validate().is_err());

        config.bot.prefix = "! ".to_string();
        assert!(config.validate().is_err());

        config.bot.prefix = "!".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn prefix_overrides_fall_back_to_default() {
        let dir = std::env::temp_dir().join(format!("warden-prefix-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut prefixes = PrefixOverrides::load(&dir, "!".to_string()).unwrap();
        assert_eq!(prefixes.prefix_for(Some(GuildId(1))), "!");
        assert_eq!(prefixes.prefix_for(None), "!");

        prefixes.set(GuildId(1), "?".to_string()).unwrap();
        assert_eq!(prefixes.prefix_for(Some(GuildId(1))), "?");
        assert_eq!(prefixes.prefix_for(Some(GuildId(2))), "!");
        assert_eq!(prefixes.prefix_for(None), "!");

        assert!(prefixes.reset(GuildId(1)).unwrap());
        assert!(!prefixes.reset(GuildId(1)).unwrap());
        assert_eq!(prefixes.prefix_for(Some(GuildId(1))), "!");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
