use std::sync::Arc;

use common::PlayerRankResponse;

use crate::config::RankingConfig;
use crate::db::ScoreStore;
use crate::error::{Result, ScoreboardError};
use crate::validation::{validate_game_id, validate_player_id};

/// Resolves a player's global rank from tier aggregates plus one exact count
/// inside the player's own tier.
///
/// Ranks are 1-based and players sharing a score count as ranked above each
/// other. The result is only as fresh as the last aggregation run that
/// covered the tiers above the player.
pub struct RankResolver {
    store: Arc<dyn ScoreStore>,
    count_top_tier: bool,
}

impl RankResolver {
    pub fn new(store: Arc<dyn ScoreStore>, config: &RankingConfig) -> Self {
        Self {
            store,
            count_top_tier: config.count_top_tier,
        }
    }

    pub async fn resolve(&self, game: &str, player: &str) -> Result<PlayerRankResponse> {
        validate_game_id(game)?;
        validate_player_id(player)?;

        let row = self
            .store
            .get_score(game, player)
            .await?
            .ok_or_else(|| {
                ScoreboardError::NotFound(format!("player {} in game {}", player, game))
            })?;

        let tiers_above = self.store.query_tiers_above(game, row.score).await?;
        let mut ranking_above: u64 = tiers_above.iter().map(|tier| tier.count).sum();

        // Without a tier above, the player sits in the top tier or in a range
        // not aggregated yet; counting up to the maximum keeps that exact.
        let next_tier_from = tiers_above.iter().map(|tier| tier.from_score).min();
        if next_tier_from.is_some() || self.count_top_tier {
            let within_tier = self
                .store
                .count_by_score_range(game, row.score, next_tier_from.map(|from| from - 1))
                .await?;
            // The player's own row is part of the count
            ranking_above += within_tier.saturating_sub(1);
        }

        Ok(PlayerRankResponse {
            score: row.score,
            rank: ranking_above + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryScoreStore;
    use crate::submission::submit_score;
    use crate::tier_aggregator::TierAggregator;

    async fn setup(scores: &[(&str, u64)], count_top_tier: bool) -> RankResolver {
        let store: Arc<dyn ScoreStore> = Arc::new(InMemoryScoreStore::new());
        for (player, score) in scores {
            submit_score(store.as_ref(), "g", player, *score).await.unwrap();
        }
        let config = RankingConfig {
            count_top_tier,
            ..RankingConfig::default()
        };
        TierAggregator::new(store.clone(), &config)
            .run_once()
            .await
            .unwrap();
        RankResolver::new(store, &config)
    }

    async fn rank(resolver: &RankResolver, player: &str) -> u64 {
        resolver.resolve("g", player).await.unwrap().rank
    }

    #[tokio::test]
    async fn test_ranks_across_tiers() {
        let resolver = setup(&[("p1", 50), ("p2", 1500), ("p3", 2500)], true).await;

        assert_eq!(
            resolver.resolve("g", "p3").await.unwrap(),
            PlayerRankResponse { score: 2500, rank: 1 }
        );
        assert_eq!(rank(&resolver, "p2").await, 2);
        assert_eq!(rank(&resolver, "p1").await, 3);
    }

    #[tokio::test]
    async fn test_ties_count_as_ranked_above() {
        let resolver = setup(&[("a", 500), ("b", 500), ("c", 700), ("d", 100)], true).await;

        assert_eq!(rank(&resolver, "c").await, 1);
        assert_eq!(rank(&resolver, "a").await, 3);
        assert_eq!(rank(&resolver, "b").await, 3);
        assert_eq!(rank(&resolver, "d").await, 4);
    }

    #[tokio::test]
    async fn test_top_tier_is_counted_exactly() {
        let scores = [("low", 10), ("a", 2100), ("b", 2900), ("c", 2500)];

        let exact = setup(&scores, true).await;
        assert_eq!(rank(&exact, "b").await, 1);
        assert_eq!(rank(&exact, "c").await, 2);
        assert_eq!(rank(&exact, "a").await, 3);
        assert_eq!(rank(&exact, "low").await, 4);

        let approximate = setup(&scores, false).await;
        assert_eq!(rank(&approximate, "a").await, 1);
        assert_eq!(rank(&approximate, "low").await, 4);
    }

    #[tokio::test]
    async fn test_unknown_player_is_not_found() {
        let resolver = setup(&[("p1", 50)], true).await;
        let err = resolver.resolve("g", "nobody").await.unwrap_err();
        assert!(matches!(err, ScoreboardError::NotFound(_)));
    }
}
