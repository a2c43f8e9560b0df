use crate::domain::{Decimal, YieldLeg};
use crate::engine::AprWeights;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub hypercore_api_url: String,
    pub evmscan_api_url: String,
    pub evmscan_api_key: Option<String>,
    pub lp_stats_url: Option<String>,
    pub reference_asset: String,
    pub reference_token_address: Option<String>,
    pub delta_threshold: Decimal,
    pub apr_weights: AprWeights,
    pub accounts: Vec<String>,
    pub collect_interval_ms: i64,
    pub lp_pools: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let hypercore_api_url = env_map
            .get("HYPERCORE_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("HYPERCORE_API_URL".to_string()))?;

        let evmscan_api_url = env_map
            .get("EVMSCAN_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("EVMSCAN_API_URL".to_string()))?;

        let evmscan_api_key = env_map.get("EVMSCAN_API_KEY").cloned();
        let lp_stats_url = env_map.get("LP_STATS_URL").cloned();

        let reference_asset = env_map
            .get("REFERENCE_ASSET")
            .cloned()
            .unwrap_or_else(|| "HYPE".to_string());

        let reference_token_address = env_map.get("REFERENCE_TOKEN_ADDRESS").cloned();

        let delta_threshold = env_map
            .get("DELTA_THRESHOLD")
            .map(|s| s.as_str())
            .unwrap_or("0.5");
        let delta_threshold = Decimal::from_str_canonical(delta_threshold).map_err(|_| {
            ConfigError::InvalidValue(
                "DELTA_THRESHOLD".to_string(),
                "must be a decimal number".to_string(),
            )
        })?;
        if delta_threshold.is_negative() {
            return Err(ConfigError::InvalidValue(
                "DELTA_THRESHOLD".to_string(),
                "must be non-negative".to_string(),
            ));
        }

        let apr_weights = match env_map.get("APR_WEIGHTS") {
            Some(raw) => parse_apr_weights(raw)?,
            None => AprWeights::two_leg_default(),
        };

        let accounts = parse_accounts_from_map(&env_map)?;

        let collect_interval_ms = env_map
            .get("COLLECT_INTERVAL_MS")
            .map(|s| s.as_str())
            .unwrap_or("300000")
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "COLLECT_INTERVAL_MS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;
        if collect_interval_ms <= 0 {
            return Err(ConfigError::InvalidValue(
                "COLLECT_INTERVAL_MS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let lp_pools = env_map
            .get("LP_POOLS")
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            port,
            database_path,
            hypercore_api_url,
            evmscan_api_url,
            evmscan_api_key,
            lp_stats_url,
            reference_asset,
            reference_token_address,
            delta_threshold,
            apr_weights,
            accounts,
            collect_interval_ms,
            lp_pools,
        })
    }
}

/// Parse "leg=weight,leg=weight" into a validated weight set,
/// e.g. "lp_fee=0.666667,funding=0.333333".
fn parse_apr_weights(raw: &str) -> Result<AprWeights, ConfigError> {
    let mut weights = BTreeMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (leg, weight) = entry.split_once('=').ok_or_else(|| {
            ConfigError::InvalidValue(
                "APR_WEIGHTS".to_string(),
                format!("expected leg=weight, got {}", entry),
            )
        })?;
        let leg = YieldLeg::from_str(leg.trim())
            .map_err(|e| ConfigError::InvalidValue("APR_WEIGHTS".to_string(), e))?;
        let weight = Decimal::from_str_canonical(weight.trim()).map_err(|_| {
            ConfigError::InvalidValue(
                "APR_WEIGHTS".to_string(),
                format!("invalid weight for {}", leg),
            )
        })?;
        weights.insert(leg, weight);
    }

    AprWeights::new(weights)
        .map_err(|e| ConfigError::InvalidValue("APR_WEIGHTS".to_string(), e.to_string()))
}

fn parse_accounts_from_map(env_map: &HashMap<String, String>) -> Result<Vec<String>, ConfigError> {
    if let Some(accounts_str) = env_map.get("ACCOUNTS") {
        Ok(accounts_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    } else if let Some(file_path) = env_map.get("ACCOUNTS_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "ACCOUNTS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        Ok(content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    } else {
        Ok(Vec::new())
    }
}
