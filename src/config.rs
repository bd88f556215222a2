use crate::error::ConfigError;
use alloy_primitives::Address;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// JSON-RPC endpoint of the chain node
    pub rpc_url: String,
    /// Address of the entity contract
    pub contract_address: String,
    /// Address whose entities are cared for (also the transaction sender)
    pub owner_address: String,

    /// Minimum seconds between effective interacts (default: 12h)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Scheduler tick period in seconds
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Connectivity check period in seconds
    #[serde(default = "default_health_check_secs")]
    pub health_check_secs: u64,
    /// Settle delay before the control interact is submitted
    #[serde(default = "default_control_delay_secs")]
    pub control_delay_secs: u64,

    /// Where keeper state snapshots are mirrored (default: next to config.toml)
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

fn default_cooldown_secs() -> u64 {
    43_200
}

fn default_tick_secs() -> u64 {
    60
}

fn default_health_check_secs() -> u64 {
    600
}

fn default_control_delay_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            rpc_url: String::new(),
            contract_address: String::new(),
            owner_address: String::new(),
            cooldown_secs: default_cooldown_secs(),
            tick_secs: default_tick_secs(),
            health_check_secs: default_health_check_secs(),
            control_delay_secs: default_control_delay_secs(),
            state_file: None,
            telegram: None,
        }
    }
}

impl Config {
    /// Load from `explicit`, `$CHAINWARD_CONFIG`, or `~/.chainward/config.toml`,
    /// then apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        let raw = fs::read_to_string(&path).map_err(|e| {
            ConfigError::Load(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.config_path = path;

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Secrets and endpoints may come from the environment instead of disk.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(rpc_url) = lookup("CHAINWARD_RPC_URL") {
            self.rpc_url = rpc_url;
        }
        if let (Some(bot_token), Some(chat_id)) = (
            lookup("CHAINWARD_TELEGRAM_BOT_TOKEN"),
            lookup("CHAINWARD_TELEGRAM_CHAT_ID"),
        ) {
            self.telegram = Some(TelegramConfig { bot_token, chat_id });
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.is_empty() {
            return Err(ConfigError::Validation("rpc_url is required".into()));
        }
        check_address("contract_address", &self.contract_address)?;
        check_address("owner_address", &self.owner_address)?;
        if self.cooldown_secs == 0 {
            return Err(ConfigError::Validation("cooldown_secs must be > 0".into()));
        }
        if self.tick_secs == 0 {
            return Err(ConfigError::Validation("tick_secs must be > 0".into()));
        }
        if self.health_check_secs == 0 {
            return Err(ConfigError::Validation(
                "health_check_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Keeper state snapshots live next to the config unless overridden.
    pub fn state_file_path(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(|| {
            self.config_path
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
                .join("state.json")
        })
    }
}

fn check_address(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} is required")));
    }
    Address::from_str(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Validation(format!("{field} {value:?}: {e}")))
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os("CHAINWARD_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let dirs = UserDirs::new()
        .ok_or_else(|| ConfigError::Load("cannot locate home directory".into()))?;
    Ok(dirs.home_dir().join(".chainward").join("config.toml"))
}
