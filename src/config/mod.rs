//! Configuration management: a TOML file with validated, sensible
//! defaults for every section. Values come from the config file when
//! present and fall back to defaults otherwise.
//!
//! ```toml
//! [game]
//! escape_chance = 0.5
//! crit_chance = 0.08
//! enemy_turn_delay_ms = 900
//!
//! [sync]
//! debounce_ms = 1500
//! data_dir = "data"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Tuning knobs for the combat and exploration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Flee success probability.
    #[serde(default = "default_escape_chance")]
    pub escape_chance: f64,
    /// Critical hit probability on player attacks and skills.
    #[serde(default = "default_crit_chance")]
    pub crit_chance: f64,
    /// Chance that exploring yields a random event instead of a fight.
    #[serde(default = "default_event_chance")]
    pub event_chance: f64,
    /// Chance a dropped piece of gear picks up an item prefix.
    #[serde(default = "default_prefix_chance")]
    pub prefix_chance: f64,
    /// Chance a spawned enemy carries a power prefix.
    #[serde(default = "default_enemy_prefix_chance")]
    pub enemy_prefix_chance: f64,
    /// Pacing delay between a player action and the enemy counter-turn.
    #[serde(default = "default_enemy_turn_delay_ms")]
    pub enemy_turn_delay_ms: u64,
}

fn default_escape_chance() -> f64 {
    0.5
}
fn default_crit_chance() -> f64 {
    0.08
}
fn default_event_chance() -> f64 {
    0.15
}
fn default_prefix_chance() -> f64 {
    0.25
}
fn default_enemy_prefix_chance() -> f64 {
    0.2
}
fn default_enemy_turn_delay_ms() -> u64 {
    900
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            escape_chance: default_escape_chance(),
            crit_chance: default_crit_chance(),
            event_chance: default_event_chance(),
            prefix_chance: default_prefix_chance(),
            enemy_prefix_chance: default_enemy_prefix_chance(),
            enemy_turn_delay_ms: default_enemy_turn_delay_ms(),
        }
    }
}

/// Synchronization engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period before a pending save is written.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Bound on the authentication phase before offline fallback.
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    /// Bound on the initial player-data load before offline fallback.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Local store directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Leaderboard snapshot size.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

fn default_debounce_ms() -> u64 {
    1500
}
fn default_auth_timeout_ms() -> u64 {
    4000
}
fn default_load_timeout_ms() -> u64 {
    5000
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_leaderboard_size() -> usize {
    10
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            auth_timeout_ms: default_auth_timeout_ms(),
            load_timeout_ms: default_load_timeout_ms(),
            data_dir: default_data_dir(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

/// External narrative service. Disabled unless an endpoint is set; the
/// canned fallback content is always available either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_narrative_timeout_ms")]
    pub timeout_ms: u64,
    /// Requests allowed per session before the quota guard trips.
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u32,
}

fn default_narrative_timeout_ms() -> u64 {
    2500
}
fn default_daily_quota() -> u32 {
    40
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_narrative_timeout_ms(),
            daily_quota: default_daily_quota(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;
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

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("game.escape_chance", self.game.escape_chance),
            ("game.crit_chance", self.game.crit_chance),
            ("game.event_chance", self.game.event_chance),
            ("game.prefix_chance", self.game.prefix_chance),
            ("game.enemy_prefix_chance", self.game.enemy_prefix_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.sync.debounce_ms == 0 {
            return Err(anyhow!("sync.debounce_ms must be positive"));
        }
        if self.sync.data_dir.is_empty() {
            return Err(anyhow!("sync.data_dir must not be empty"));
        }
        Ok(())
    }
}
