use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::models::*;
use super::{ScoreStore, StoreResult};
use crate::error::StoreError;

/// Position of a row in the score index: descending score, then ascending player
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ScoreIndexKey {
    score: Reverse<u64>,
    player: String,
}

impl ScoreIndexKey {
    fn new(score: u64, player: impl Into<String>) -> Self {
        Self {
            score: Reverse(score),
            player: player.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Partition {
    scores: HashMap<String, u64>,
    score_index: BTreeSet<ScoreIndexKey>,
    tiers: BTreeMap<u64, TierAggregate>,
}

#[derive(Debug, Default)]
struct Tables {
    partitions: HashMap<String, Partition>,
    games: BTreeSet<String>,
}

/// Process-local score table with the same ordering and key semantics as the
/// DynamoDB layout. Used by tests and for single-node local runs.
#[derive(Debug, Default)]
pub struct InMemoryScoreStore {
    tables: RwLock<Tables>,
    closed: AtomicBool,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable(anyhow!("score store is closed")));
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn put_score(&self, row: &PlayerScore) -> StoreResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let partition = tables.partitions.entry(row.game.clone()).or_default();

        if let Some(previous) = partition.scores.insert(row.player.clone(), row.score) {
            partition
                .score_index
                .remove(&ScoreIndexKey::new(previous, row.player.as_str()));
        }
        partition
            .score_index
            .insert(ScoreIndexKey::new(row.score, row.player.as_str()));
        Ok(())
    }

    async fn get_score(&self, game: &str, player: &str) -> StoreResult<Option<PlayerScore>> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        Ok(tables
            .partitions
            .get(game)
            .and_then(|partition| partition.scores.get(player))
            .map(|score| PlayerScore::new(game, player, *score)))
    }

    async fn query_by_score_desc(
        &self,
        game: &str,
        limit: usize,
        start: Option<&PlayerScore>,
    ) -> StoreResult<ScorePage> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        let Some(partition) = tables.partitions.get(game) else {
            return Ok(ScorePage::default());
        };

        let lower = match start {
            Some(row) => Bound::Excluded(ScoreIndexKey::new(row.score, row.player.as_str())),
            None => Bound::Unbounded,
        };

        // One extra row tells whether another page exists
        let mut items: Vec<PlayerScore> = partition
            .score_index
            .range((lower, Bound::Unbounded))
            .take(limit.saturating_add(1))
            .map(|key| PlayerScore::new(game, key.player.as_str(), key.score.0))
            .collect();

        let last_evaluated = if items.len() > limit {
            items.truncate(limit);
            items.last().cloned()
        } else {
            None
        };

        Ok(ScorePage {
            items,
            last_evaluated,
        })
    }

    async fn count_by_score_range(
        &self,
        game: &str,
        low: u64,
        high: Option<u64>,
    ) -> StoreResult<u64> {
        self.ensure_open()?;
        if high.is_some_and(|high| high < low) {
            return Ok(0);
        }

        let tables = self.tables.read().await;
        let Some(partition) = tables.partitions.get(game) else {
            return Ok(0);
        };

        // The empty player id sorts first among rows sharing a score
        let upper = match high {
            Some(high) => Bound::Included(ScoreIndexKey::new(high, "")),
            None => Bound::Unbounded,
        };
        let count = partition
            .score_index
            .range((upper, Bound::Unbounded))
            .take_while(|key| key.score.0 >= low)
            .count();
        Ok(count as u64)
    }

    async fn put_tier(&self, tier: &TierAggregate) -> StoreResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        tables
            .partitions
            .entry(tier.game.clone())
            .or_default()
            .tiers
            .insert(tier.from_score, tier.clone());
        Ok(())
    }

    async fn query_tiers_above(&self, game: &str, score: u64) -> StoreResult<Vec<TierAggregate>> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        Ok(tables
            .partitions
            .get(game)
            .map(|partition| {
                partition
                    .tiers
                    .range((Bound::Excluded(score), Bound::Unbounded))
                    .map(|(_, tier)| tier.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_tiers(&self, game: &str) -> StoreResult<Vec<TierAggregate>> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        Ok(tables
            .partitions
            .get(game)
            .map(|partition| partition.tiers.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_tier(&self, game: &str, from_score: u64) -> StoreResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        if let Some(partition) = tables.partitions.get_mut(game) {
            partition.tiers.remove(&from_score);
        }
        Ok(())
    }

    async fn delete_tiers(&self, game: &str) -> StoreResult<u64> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let deleted = tables
            .partitions
            .get_mut(game)
            .map(|partition| std::mem::take(&mut partition.tiers).len())
            .unwrap_or(0);
        Ok(deleted as u64)
    }

    async fn register_game(&self, game: &str) -> StoreResult<()> {
        self.ensure_open()?;
        self.tables.write().await.games.insert(game.to_string());
        Ok(())
    }

    async fn list_games(&self) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.tables.read().await.games.iter().cloned().collect())
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
