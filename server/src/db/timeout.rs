use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::models::*;
use super::{ScoreStore, StoreResult};
use crate::error::StoreError;

/// Applies a deadline to every operation of the wrapped store.
/// An elapsed deadline surfaces as the retryable [`StoreError::Timeout`].
pub struct TimeoutStore {
    inner: Arc<dyn ScoreStore>,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn ScoreStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn guard<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Store operation {} timed out after {:?}", operation, self.timeout);
                Err(StoreError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl ScoreStore for TimeoutStore {
    async fn put_score(&self, row: &PlayerScore) -> StoreResult<()> {
        self.guard("put_score", self.inner.put_score(row)).await
    }

    async fn get_score(&self, game: &str, player: &str) -> StoreResult<Option<PlayerScore>> {
        self.guard("get_score", self.inner.get_score(game, player)).await
    }

    async fn query_by_score_desc(
        &self,
        game: &str,
        limit: usize,
        start: Option<&PlayerScore>,
    ) -> StoreResult<ScorePage> {
        self.guard(
            "query_by_score_desc",
            self.inner.query_by_score_desc(game, limit, start),
        )
        .await
    }

    async fn count_by_score_range(
        &self,
        game: &str,
        low: u64,
        high: Option<u64>,
    ) -> StoreResult<u64> {
        self.guard(
            "count_by_score_range",
            self.inner.count_by_score_range(game, low, high),
        )
        .await
    }

    async fn put_tier(&self, tier: &TierAggregate) -> StoreResult<()> {
        self.guard("put_tier", self.inner.put_tier(tier)).await
    }

    async fn query_tiers_above(&self, game: &str, score: u64) -> StoreResult<Vec<TierAggregate>> {
        self.guard("query_tiers_above", self.inner.query_tiers_above(game, score))
            .await
    }

    async fn query_tiers(&self, game: &str) -> StoreResult<Vec<TierAggregate>> {
        self.guard("query_tiers", self.inner.query_tiers(game)).await
    }

    async fn delete_tier(&self, game: &str, from_score: u64) -> StoreResult<()> {
        self.guard("delete_tier", self.inner.delete_tier(game, from_score))
            .await
    }

    async fn delete_tiers(&self, game: &str) -> StoreResult<u64> {
        self.guard("delete_tiers", self.inner.delete_tiers(game)).await
    }

    async fn register_game(&self, game: &str) -> StoreResult<()> {
        self.guard("register_game", self.inner.register_game(game)).await
    }

    async fn list_games(&self) -> StoreResult<Vec<String>> {
        self.guard("list_games", self.inner.list_games()).await
    }

    async fn close(&self) -> StoreResult<()> {
        self.guard("close", self.inner.close()).await
    }
}
