use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use common::{
    DEFAULT_AGGREGATION_INTERVAL_SECS, DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE,
    DEFAULT_TIER_WIDTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StoreBackend::DynamoDb),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => bail!("unknown store backend: {}", other),
        }
    }
}

/// Connection settings of the score table
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub table_name: String,
    /// Endpoint override, e.g. LocalStack
    pub endpoint: Option<String>,
    /// Deadline applied to every individual store operation
    pub timeout: Duration,
}

/// Ranking knobs shared by the aggregator, the rank resolver and the paginator
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Bucket size in score units
    pub tier_width: u64,
    /// Recompute frequency of tier aggregates
    pub aggregation_interval: Duration,
    /// Scoreboard page size when the client does not ask for one
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Games needing more tiers than this are skipped by the aggregator
    pub max_tiers_per_game: u64,
    /// Count players inside the top tier exactly instead of assuming rank 1.
    /// Disabling restores the approximation where a player with no
    /// aggregated tier above them is always reported as rank 1.
    pub count_top_tier: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            tier_width: DEFAULT_TIER_WIDTH,
            aggregation_interval: Duration::from_secs(DEFAULT_AGGREGATION_INTERVAL_SECS),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            max_tiers_per_game: 100_000,
            count_top_tier: true,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tier_width == 0 {
            bail!("TIER_WIDTH must be greater than zero");
        }
        if self.aggregation_interval.is_zero() {
            bail!("AGGREGATION_INTERVAL_SECS must be greater than zero");
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            bail!("page sizes must be greater than zero");
        }
        if self.default_page_size > self.max_page_size {
            bail!(
                "DEFAULT_PAGE_SIZE ({}) exceeds MAX_PAGE_SIZE ({})",
                self.default_page_size,
                self.max_page_size
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub http_addr: String,
    pub store: StoreConfig,
    pub ranking: RankingConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = RankingConfig::default();

        let ranking = RankingConfig {
            tier_width: env_or("TIER_WIDTH", defaults.tier_width)?,
            aggregation_interval: Duration::from_secs(env_or(
                "AGGREGATION_INTERVAL_SECS",
                defaults.aggregation_interval.as_secs(),
            )?),
            default_page_size: env_or("DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: env_or("MAX_PAGE_SIZE", defaults.max_page_size)?,
            max_tiers_per_game: env_or("MAX_TIERS_PER_GAME", defaults.max_tiers_per_game)?,
            count_top_tier: env_or("RANK_COUNT_TOP_TIER", defaults.count_top_tier)?,
        };
        ranking.validate()?;

        let store = StoreConfig {
            backend: env_or("SCOREBOARD_STORE_BACKEND", StoreBackend::DynamoDb)?,
            table_name: env::var("TABLE_NAME").unwrap_or_else(|_| "scoreboard-table".to_string()),
            endpoint: env::var("DYNAMODB_ENDPOINT").ok().filter(|e| !e.is_empty()),
            timeout: Duration::from_millis(env_or("STORE_TIMEOUT_MS", 5000u64)?),
        };
        if store.timeout.is_zero() {
            bail!("STORE_TIMEOUT_MS must be greater than zero");
        }

        Ok(Self {
            http_addr: env::var("SCOREBOARD_HTTP_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            store,
            ranking,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| -> anyhow::Error { e.into() })
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}
