use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::game::{Difficulty, MAX_LEVEL};

/// Namespace for derived puzzle keys and topics when none is configured.
pub const DEFAULT_KEY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_93d4_4c59_a0e8_5d2f_b41c_7a03);
pub const DEFAULT_NOTIFICATION_TOPIC: &str = "gameNotification";

/// Largest accepted time base, so the longest puzzle stays within a day.
pub const MAX_TIME_BASE: u64 = 86_400 / (MAX_LEVEL as u64 + 1);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Seconds per level granted for each difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
}

impl TimeBudget {
    pub fn base(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    /// `base(difficulty) * (level + 1)`
    pub fn seconds(&self, difficulty: Difficulty, level: u8) -> u64 {
        self.base(difficulty).saturating_mul(level as u64 + 1)
    }
}

impl Default for TimeBudget {
    fn default() -> Self {
        TimeBudget { easy: 600, medium: 300, hard: 150 }
    }
}

/// Process-wide settings, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub public_url: String,
    pub key_namespace: Uuid,
    pub notification_topic: String,
    pub channel_capacity: usize,
    pub time_budget: TimeBudget,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: "headtohead.db".to_string(),
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            upload_dir: PathBuf::from("uploads"),
            public_url: "http://localhost:3000/uploads".to_string(),
            key_namespace: DEFAULT_KEY_NAMESPACE,
            notification_topic: DEFAULT_NOTIFICATION_TOPIC.to_string(),
            channel_capacity: 64,
            time_budget: TimeBudget::default(),
        }
    }
}

impl Config {
    /// Read `HEADTOHEAD_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let budget = defaults.time_budget;

        Ok(Config {
            db_path: lookup("HEADTOHEAD_DB_PATH").unwrap_or(defaults.db_path),
            addr: parse_or(&lookup, "HEADTOHEAD_ADDR", defaults.addr)?,
            upload_dir: lookup("HEADTOHEAD_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_url: lookup("HEADTOHEAD_PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            key_namespace: parse_or(&lookup, "HEADTOHEAD_KEY_NAMESPACE", defaults.key_namespace)?,
            notification_topic: lookup("HEADTOHEAD_NOTIFICATION_TOPIC")
                .unwrap_or(defaults.notification_topic),
            channel_capacity: parse_or(&lookup, "HEADTOHEAD_CHANNEL_CAPACITY", defaults.channel_capacity)?,
            time_budget: TimeBudget {
                easy: parse_time_base(&lookup, "HEADTOHEAD_TIME_EASY", budget.easy)?,
                medium: parse_time_base(&lookup, "HEADTOHEAD_TIME_MEDIUM", budget.medium)?,
                hard: parse_time_base(&lookup, "HEADTOHEAD_TIME_HARD", budget.hard)?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => {
            let parsed = value.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid { key, value })
        }
        None => Ok(default),
    }
}

/// Seconds per level, between 1 and [`MAX_TIME_BASE`].
fn parse_time_base<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let base = parse_or(lookup, key, default)?;
    if (1..=MAX_TIME_BASE).contains(&base) {
        Ok(base)
    } else {
        Err(ConfigError::Invalid { key, value: base.to_string() })
    }
}
