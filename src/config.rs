// src/config.rs

use lazy_static::lazy_static;
use std::str::FromStr;
use std::time::Duration;
use strum::{Display, EnumString};
use tracing::debug;

use crate::core::error::ConfigError;
use crate::core::enumerator::DEFAULT_STRATEGY_TIMEOUT;
use crate::logging::PROJECT_NAME;

lazy_static! {
    pub static ref STRATEGIES_ENV: String = format!("{}_STRATEGIES", PROJECT_NAME.clone());
    pub static ref STRATEGY_TIMEOUT_ENV: String = format!("{}_STRATEGY_TIMEOUT_SECS", PROJECT_NAME.clone());
    pub static ref HTTP_TIMEOUT_ENV: String = format!("{}_HTTP_TIMEOUT_SECS", PROJECT_NAME.clone());
    pub static ref USER_AGENT_ENV: String = format!("{}_USER_AGENT", PROJECT_NAME.clone());
}

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_USER_AGENT: &str = "VanguardRS/0.1";

/// The built-in discovery strategies, by their configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum StrategyKind {
    #[strum(serialize = "dns")]
    Dns,
    #[strum(serialize = "crt.sh")]
    CrtSh,
    #[strum(serialize = "cert-san")]
    CertSan,
    #[strum(serialize = "securitytrails")]
    SecurityTrails,
    #[strum(serialize = "censys")]
    Censys,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Dns,
        StrategyKind::CrtSh,
        StrategyKind::CertSan,
        StrategyKind::SecurityTrails,
        StrategyKind::Censys,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconConfig {
    pub strategies: Vec<StrategyKind>,
    pub strategy_timeout: Duration,
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            strategies: StrategyKind::ALL.to_vec(),
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ReconConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Missing or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(list) = get(STRATEGIES_ENV.as_str()) {
            config.strategies = parse_strategies(&list)?;
        }
        if let Some(value) = get(STRATEGY_TIMEOUT_ENV.as_str()) {
            config.strategy_timeout = parse_seconds(STRATEGY_TIMEOUT_ENV.as_str(), &value)?;
        }
        if let Some(value) = get(HTTP_TIMEOUT_ENV.as_str()) {
            config.http_timeout = parse_seconds(HTTP_TIMEOUT_ENV.as_str(), &value)?;
        }
        if let Some(agent) = get(USER_AGENT_ENV.as_str()) {
            config.user_agent = agent;
        }

        debug!(?config, "Loaded configuration.");
        Ok(config)
    }
}

fn parse_strategies(list: &str) -> Result<Vec<StrategyKind>, ConfigError> {
    let mut strategies = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let kind = StrategyKind::from_str(name).map_err(|_| ConfigError::UnknownStrategy(name.to_string()))?;
        if !strategies.contains(&kind) {
            strategies.push(kind);
        }
    }
    Ok(strategies)
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}
