use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;

use server::db::models::{PlayerScore, ScorePage, TierAggregate};
use server::db::{InMemoryScoreStore, ScoreStore, StoreResult};
use server::error::StoreError;

/// In-memory store with switchable failures
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryScoreStore,
    /// Games whose score queries fail
    pub failing_games: std::sync::Mutex<HashSet<String>>,
    pub fail_registry_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_game(&self, game: &str) {
        self.failing_games.lock().unwrap().insert(game.to_string());
    }

    fn check(&self, game: &str) -> StoreResult<()> {
        if self.failing_games.lock().unwrap().contains(game) {
            return Err(StoreError::Unavailable(anyhow!("injected failure for {}", game)));
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for FlakyStore {
    async fn put_score(&self, row: &PlayerScore) -> StoreResult<()> {
        self.inner.put_score(row).await
    }

    async fn get_score(&self, game: &str, player: &str) -> StoreResult<Option<PlayerScore>> {
        self.check(game)?;
        self.inner.get_score(game, player).await
    }

    async fn query_by_score_desc(
        &self,
        game: &str,
        limit: usize,
        start: Option<&PlayerScore>,
    ) -> StoreResult<ScorePage> {
        self.check(game)?;
        self.inner.query_by_score_desc(game, limit, start).await
    }

    async fn count_by_score_range(
        &self,
        game: &str,
        low: u64,
        high: Option<u64>,
    ) -> StoreResult<u64> {
        self.check(game)?;
        self.inner.count_by_score_range(game, low, high).await
    }

    async fn put_tier(&self, tier: &TierAggregate) -> StoreResult<()> {
        self.inner.put_tier(tier).await
    }

    async fn query_tiers_above(&self, game: &str, score: u64) -> StoreResult<Vec<TierAggregate>> {
        self.inner.query_tiers_above(game, score).await
    }

    async fn query_tiers(&self, game: &str) -> StoreResult<Vec<TierAggregate>> {
        self.inner.query_tiers(game).await
    }

    async fn delete_tier(&self, game: &str, from_score: u64) -> StoreResult<()> {
        self.inner.delete_tier(game, from_score).await
    }

    async fn delete_tiers(&self, game: &str) -> StoreResult<u64> {
        self.inner.delete_tiers(game).await
    }

    async fn register_game(&self, game: &str) -> StoreResult<()> {
        if self.fail_registry_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow!("injected registry failure")));
        }
        self.inner.register_game(game).await
    }

    async fn list_games(&self) -> StoreResult<Vec<String>> {
        self.inner.list_games().await
    }
}
