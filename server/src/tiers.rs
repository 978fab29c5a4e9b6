use tracing::info;

use crate::db::ScoreStore;
use crate::error::Result;
use crate::validation::validate_game_id;

/// Fixed-width partition of `[0, max_score]` into tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPlan {
    width: u64,
    tier_count: u64,
}

impl TierPlan {
    /// `width` must be non-zero
    pub fn new(max_score: u64, width: u64) -> Self {
        debug_assert!(width > 0);
        let width = width.max(1);
        Self {
            width,
            // ceil((max_score + 1) / width) without overflowing at u64::MAX
            tier_count: max_score / width + 1,
        }
    }

    pub fn tier_count(&self) -> u64 {
        self.tier_count
    }

    /// Inclusive `(from_score, to_score)` bounds of every tier, lowest first
    pub fn ranges(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        (1..=self.tier_count).map(move |i| {
            let from_score = (i - 1).saturating_mul(self.width);
            let to_score = i.saturating_mul(self.width).saturating_sub(1);
            (from_score, to_score)
        })
    }

    /// Whether a stored tier starting at `from_score` belongs to this plan
    pub fn contains_tier(&self, from_score: u64) -> bool {
        from_score % self.width == 0 && from_score / self.width < self.tier_count
    }
}

/// Remove every tier aggregate of a game. Scores are untouched; the next
/// aggregation run rebuilds the tiers from scratch. Safe to repeat.
pub async fn delete_tier_aggregates(store: &dyn ScoreStore, game: &str) -> Result<u64> {
    validate_game_id(game)?;
    let deleted = store.delete_tiers(game).await?;
    info!("Deleted {} tier aggregates for game {}", deleted, game);
    Ok(deleted)
}
