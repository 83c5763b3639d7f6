//! # Configuration Management
//!
//! Typed TOML configuration for the whole bot. Every tunable the handlers and
//! engines consult lives here and is passed in at construction time; there is
//! no ambient global state.
//!
//! Sections:
//!
//! - [`BotConfig`] - identity, command prefixes, owner list
//! - [`StorageConfig`] - data directory for the JSON snapshot stores
//! - [`SpamConfig`] - cooldowns, warning and ban windows
//! - [`ProgressionConfig`] - starter stats and per-level growth
//! - [`RewardsConfig`] - hunt/fish reward ranges
//! - [`SubBotConfig`] - sub-bot provisioning limits and cost
//! - [`ApiConfig`] - statically configured API keys
//! - [`LoggingConfig`] - log level and optional file target
//!
//! ```rust,no_run
//! use questbot::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Bot: {}", config.bot.name);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub spam: SpamConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub subbots: SubBotConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    /// Accepted command prefixes, tried in order. An empty string is a
    /// catch-all that matches every message and is honored only when listed
    /// here explicitly.
    pub prefixes: Vec<String>,
    /// User identities allowed to run owner-only commands.
    #[serde(default)]
    pub owners: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

/// Cooldown, warning, and ban tuning for the anti-spam gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamConfig {
    /// Minimum gap between any two commands from the same user (ms).
    pub global_cooldown_ms: i64,
    /// Fallback per-command cooldown when no override is configured (ms).
    pub default_command_cooldown_ms: i64,
    /// Per-command overrides, keyed by canonical command name (ms).
    #[serde(default)]
    pub command_cooldowns_ms: HashMap<String, i64>,
    /// Active warnings that trigger a ban.
    pub max_warnings: u32,
    /// Ban length once issued (seconds).
    pub ban_duration_secs: i64,
    /// Window after which a warning stops counting as active (seconds).
    pub warn_reset_secs: i64,
}

impl Default for SpamConfig {
    fn default() -> Self {
        let mut command_cooldowns_ms = HashMap::new();
        command_cooldowns_ms.insert("hunt".to_string(), 5000);
        command_cooldowns_ms.insert("fish".to_string(), 5000);
        command_cooldowns_ms.insert("battle".to_string(), 10000);
        command_cooldowns_ms.insert("ttt".to_string(), 1000);
        Self {
            global_cooldown_ms: 1000,
            default_command_cooldown_ms: 500,
            command_cooldowns_ms,
            max_warnings: 3,
            ban_duration_secs: 3600,
            warn_reset_secs: 86_400,
        }
    }
}

impl SpamConfig {
    /// Cooldown for a canonical command name, falling back to the default.
    pub fn cooldown_for(&self, command: &str) -> i64 {
        self.command_cooldowns_ms
            .get(command)
            .copied()
            .unwrap_or(self.default_command_cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarterStats {
    pub max_health: u32,
    pub attack: u32,
    pub defense: u32,
    pub gold: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthConfig {
    pub health_per_level: u32,
    pub attack_per_level: u32,
    pub defense_per_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    pub starting: StarterStats,
    pub growth: GrowthConfig,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            starting: StarterStats {
                max_health: 100,
                attack: 10,
                defense: 5,
                gold: 100,
            },
            growth: GrowthConfig {
                health_per_level: 10,
                attack_per_level: 2,
                defense_per_level: 1,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRange {
    pub min_exp: u64,
    pub max_exp: u64,
    pub min_gold: u64,
    pub max_gold: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    pub hunt: RewardRange,
    pub fish: RewardRange,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            hunt: RewardRange {
                min_exp: 8,
                max_exp: 20,
                min_gold: 20,
                max_gold: 80,
            },
            fish: RewardRange {
                min_exp: 5,
                max_exp: 15,
                min_gold: 10,
                max_gold: 60,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubBotConfig {
    /// Maximum sub-bots a single owner may register.
    pub max_per_owner: u32,
    /// Gold charged when a sub-bot is created.
    pub creation_cost: u64,
    /// Default command prefix assigned to new sub-bots.
    pub default_prefix: String,
}

impl Default for SubBotConfig {
    fn default() -> Self {
        Self {
            max_per_owner: 1,
            creation_cost: 50_000,
            default_prefix: "!".to_string(),
        }
    }
}

/// A statically configured API key entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeySeed {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    /// Key string -> grant. Runtime-generated keys live in the key store file,
    /// not here.
    #[serde(default)]
    pub keys: HashMap<String, ApiKeySeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        if config.bot.prefixes.is_empty() {
            return Err(anyhow!(
                "Config {} must list at least one command prefix",
                path
            ));
        }

        Ok(config)
    }

    /// Write a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig {
                name: "Questbot".to_string(),
                prefixes: vec!["!".to_string()],
                owners: Vec::new(),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            spam: SpamConfig::default(),
            progression: ProgressionConfig::default(),
            rewards: RewardsConfig::default(),
            subbots: SubBotConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("questbot.log".to_string()),
            },
        }
    }
}
