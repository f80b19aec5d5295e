use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use tombola_engine::Settings;
use tombola_types::{Money, MoneyError, Player, PlayerId};
use tracing::Level;
use url::Url;

/// Configuration for the [crate::Api] server, read from YAML.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_rate_limit_per_second")]
    pub rate_limit_per_second: u64,
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,

    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub relay_attempts: Option<usize>,
    #[serde(default)]
    pub privileged_player: Option<u64>,

    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
    #[serde(default = "default_call_interval_secs")]
    pub call_interval_secs: u64,
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
    #[serde(default = "default_presence_stale_secs")]
    pub presence_stale_secs: u64,
    #[serde(default = "default_presence_ttl_secs")]
    pub presence_ttl_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    #[serde(default = "default_winner_display_secs")]
    pub winner_display_secs: u64,
    #[serde(default = "default_min_players")]
    pub min_players: u32,
    #[serde(default = "default_house_edge_percent")]
    pub house_edge_percent: u32,

    #[serde(default)]
    pub players: Vec<PlayerSeed>,
}

/// An account loaded into the in-memory wallet at startup.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlayerSeed {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    /// Decimal amount with at most two fractional digits.
    pub wallet: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("min_players must be >= 2 (got {value})")]
    InvalidMinPlayers { value: u32 },
    #[error("house_edge_percent must be <= 100 (got {value})")]
    InvalidHouseEdge { value: u32 },
    #[error("wallet of player {id} is invalid: {value}")]
    InvalidWallet {
        id: u64,
        value: String,
        #[source]
        source: MoneyError,
    },
    #[error("relay_url is invalid: {value}")]
    InvalidRelayUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

pub struct ValidatedConfig {
    pub port: u16,
    pub log_level: Level,
    pub json_logs: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub relay_url: Option<Url>,
    pub relay_attempts: usize,
    pub settings: Settings,
    pub players: Vec<Player>,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rate_limit_per_second() -> u64 {
    50
}

fn default_rate_limit_burst() -> u32 {
    100
}

fn default_countdown_secs() -> u64 {
    30
}

fn default_call_interval_secs() -> u64 {
    3
}

fn default_restart_delay_secs() -> u64 {
    5
}

fn default_presence_stale_secs() -> u64 {
    15
}

fn default_presence_ttl_secs() -> u64 {
    120
}

fn default_reap_interval_secs() -> u64 {
    3
}

fn default_winner_display_secs() -> u64 {
    10
}

fn default_min_players() -> u32 {
    2
}

fn default_house_edge_percent() -> u32 {
    20
}

fn non_zero(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(value)
}

impl Default for Config {
    fn default() -> Self {
        // An empty document takes every default
        Self {
            port: default_port(),
            log_level: default_log_level(),
            json_logs: false,
            rate_limit_per_second: default_rate_limit_per_second(),
            rate_limit_burst: default_rate_limit_burst(),
            relay_url: None,
            relay_attempts: None,
            privileged_player: None,
            countdown_secs: default_countdown_secs(),
            call_interval_secs: default_call_interval_secs(),
            restart_delay_secs: default_restart_delay_secs(),
            presence_stale_secs: default_presence_stale_secs(),
            presence_ttl_secs: default_presence_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            winner_display_secs: default_winner_display_secs(),
            min_players: default_min_players(),
            house_edge_percent: default_house_edge_percent(),
            players: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;
        let rate_limit_per_second = non_zero("rate_limit_per_second", self.rate_limit_per_second)?;
        non_zero("rate_limit_burst", self.rate_limit_burst as u64)?;
        let call_interval = non_zero("call_interval_secs", self.call_interval_secs)?;
        if self.min_players < 2 {
            return Err(ConfigError::InvalidMinPlayers {
                value: self.min_players,
            });
        }
        if self.house_edge_percent > 100 {
            return Err(ConfigError::InvalidHouseEdge {
                value: self.house_edge_percent,
            });
        }
        let relay_url = match &self.relay_url {
            Some(value) => Some(Url::parse(value).map_err(|source| {
                ConfigError::InvalidRelayUrl {
                    value: value.clone(),
                    source,
                }
            })?),
            None => None,
        };
        let relay_attempts = non_zero("relay_attempts", self.relay_attempts.unwrap_or(3) as u64)?;

        let players = self
            .players
            .into_iter()
            .map(|seed| {
                let wallet = Money::from_str(&seed.wallet)
                    .and_then(|wallet| {
                        if wallet.is_negative() {
                            return Err(MoneyError::Invalid(seed.wallet.clone()));
                        }
                        Ok(wallet)
                    })
                    .map_err(|source| ConfigError::InvalidWallet {
                        id: seed.id,
                        value: seed.wallet.clone(),
                        source,
                    })?;
                Ok(Player::new(PlayerId(seed.id), seed.username, wallet))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let settings = Settings {
            countdown: Duration::from_secs(self.countdown_secs),
            call_interval: Duration::from_secs(call_interval),
            restart_delay: Duration::from_secs(self.restart_delay_secs),
            presence_stale: Duration::from_secs(self.presence_stale_secs),
            presence_ttl: Duration::from_secs(self.presence_ttl_secs),
            reap_interval: Duration::from_secs(self.reap_interval_secs),
            winner_display: Duration::from_secs(self.winner_display_secs),
            min_players: self.min_players,
            house_edge_percent: self.house_edge_percent,
            privileged: self.privileged_player.map(PlayerId),
            ..Settings::default()
        };

        Ok(ValidatedConfig {
            port: self.port,
            log_level,
            json_logs: self.json_logs,
            rate_limit_per_second,
            rate_limit_burst: self.rate_limit_burst,
            relay_url,
            relay_attempts: relay_attempts as usize,
            settings,
            players,
        })
    }
}
