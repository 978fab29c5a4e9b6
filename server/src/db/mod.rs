pub mod dynamodb;
pub mod memory;
pub mod models;
pub mod timeout;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use models::*;

pub use dynamodb::DynamoScoreStore;
pub use memory::InMemoryScoreStore;
pub use timeout::TimeoutStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Ordered score table shared by every game.
///
/// Each game is one partition holding its player scores and its tier
/// aggregates; the game registry lives in a partition of its own. Every
/// operation touches a single partition. Writes replace whole rows by key,
/// nothing is read-modify-write, so concurrent readers can see stale rows
/// but never torn ones.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    // Player scores
    async fn put_score(&self, row: &PlayerScore) -> StoreResult<()>;
    async fn get_score(&self, game: &str, player: &str) -> StoreResult<Option<PlayerScore>>;
    /// Rows ordered by descending score, ties by ascending player id.
    /// With `start`, the page begins strictly after that row's position.
    async fn query_by_score_desc(
        &self,
        game: &str,
        limit: usize,
        start: Option<&PlayerScore>,
    ) -> StoreResult<ScorePage>;
    /// Number of rows with `low <= score <= high`; no upper bound when `high` is `None`
    async fn count_by_score_range(
        &self,
        game: &str,
        low: u64,
        high: Option<u64>,
    ) -> StoreResult<u64>;

    // Tier aggregates
    async fn put_tier(&self, tier: &TierAggregate) -> StoreResult<()>;
    /// Tiers with `from_score > score`, ascending by `from_score`
    async fn query_tiers_above(&self, game: &str, score: u64) -> StoreResult<Vec<TierAggregate>>;
    /// All tiers of a game, ascending by `from_score`
    async fn query_tiers(&self, game: &str) -> StoreResult<Vec<TierAggregate>>;
    async fn delete_tier(&self, game: &str, from_score: u64) -> StoreResult<()>;
    /// Remove every tier of a game, returning how many rows were deleted
    async fn delete_tiers(&self, game: &str) -> StoreResult<u64>;

    // Game registry
    async fn register_game(&self, game: &str) -> StoreResult<()>;
    async fn list_games(&self) -> StoreResult<Vec<String>>;

    /// Release the underlying connection. Every operation after close fails
    /// with [`StoreError::Unavailable`](crate::error::StoreError::Unavailable).
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Open the configured backend wrapped with the per-operation timeout
pub async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn ScoreStore>> {
    let inner: Arc<dyn ScoreStore> = match config.backend {
        StoreBackend::DynamoDb => Arc::new(
            DynamoScoreStore::open(config)
                .await
                .context("Failed to open DynamoDB score store")?,
        ),
        StoreBackend::Memory => {
            info!("Using in-memory score store; scores are lost on shutdown");
            Arc::new(InMemoryScoreStore::new())
        }
    };
    Ok(Arc::new(TimeoutStore::new(inner, config.timeout)))
}
