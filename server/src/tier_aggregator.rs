use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RankingConfig;
use crate::db::ScoreStore;
use crate::db::models::TierAggregate;
use crate::error::Result;
use crate::tiers::TierPlan;

/// Outcome of aggregating a single game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAggregation {
    /// No scores yet, nothing written
    Empty,
    /// Plan needs more tiers than allowed, nothing written
    TooManyTiers(u64),
    Aggregated { tiers_written: u64, tiers_pruned: u64 },
}

/// Summary of one aggregation run across all registered games
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationReport {
    pub started_at: DateTime<Utc>,
    pub games: usize,
    pub aggregated: usize,
    pub empty: usize,
    pub failed: usize,
    pub tiers_written: u64,
    pub tiers_pruned: u64,
}

impl AggregationReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            games: 0,
            aggregated: 0,
            empty: 0,
            failed: 0,
            tiers_written: 0,
            tiers_pruned: 0,
        }
    }

    /// Wall time since the run started
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }
}

/// Recomputes per-tier player counts for every known game.
///
/// Tier rows are replaced by key and never read back before writing, so a
/// run can overlap with rank lookups or with another run: readers only ever
/// see counts that are stale, never partially written.
pub struct TierAggregator {
    store: Arc<dyn ScoreStore>,
    tier_width: u64,
    max_tiers_per_game: u64,
}

impl TierAggregator {
    pub fn new(store: Arc<dyn ScoreStore>, config: &RankingConfig) -> Self {
        Self {
            store,
            tier_width: config.tier_width,
            max_tiers_per_game: config.max_tiers_per_game,
        }
    }

    /// Aggregate every registered game. A failing game is logged and skipped
    /// until the next run; only failing to list the games fails the run.
    pub async fn run_once(&self) -> Result<AggregationReport> {
        let mut report = AggregationReport::new();
        let games = self.store.list_games().await?;
        report.games = games.len();

        for game in &games {
            match self.aggregate_game(game).await {
                Ok(GameAggregation::Empty) => {
                    debug!("Game {} has no scores, skipping", game);
                    report.empty += 1;
                }
                Ok(GameAggregation::TooManyTiers(tier_count)) => {
                    error!(
                        "Game {} needs {} tiers of width {}, limit is {}; skipping",
                        game, tier_count, self.tier_width, self.max_tiers_per_game
                    );
                    report.failed += 1;
                }
                Ok(GameAggregation::Aggregated {
                    tiers_written,
                    tiers_pruned,
                }) => {
                    report.aggregated += 1;
                    report.tiers_written += tiers_written;
                    report.tiers_pruned += tiers_pruned;
                }
                Err(e) => {
                    error!("Failed to aggregate tiers for game {}: {}", game, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    pub async fn aggregate_game(&self, game: &str) -> Result<GameAggregation> {
        let top = self.store.query_by_score_desc(game, 1, None).await?;
        let Some(max_score) = top.items.first().map(|row| row.score) else {
            return Ok(GameAggregation::Empty);
        };

        let plan = TierPlan::new(max_score, self.tier_width);
        if plan.tier_count() > self.max_tiers_per_game {
            return Ok(GameAggregation::TooManyTiers(plan.tier_count()));
        }

        let mut tiers_written = 0;
        for (from_score, to_score) in plan.ranges() {
            let count = self
                .store
                .count_by_score_range(game, from_score, Some(to_score))
                .await?;
            self.store
                .put_tier(&TierAggregate {
                    game: game.to_string(),
                    from_score,
                    to_score,
                    count,
                })
                .await?;
            debug!("{} {}-{}: {}", game, from_score, to_score, count);
            tiers_written += 1;
        }

        // Tiers above a lowered max score, or left by another tier width
        let mut tiers_pruned = 0;
        for tier in self.store.query_tiers(game).await? {
            if !plan.contains_tier(tier.from_score) {
                self.store.delete_tier(game, tier.from_score).await?;
                tiers_pruned += 1;
            }
        }

        Ok(GameAggregation::Aggregated {
            tiers_written,
            tiers_pruned,
        })
    }
}

/// Run the aggregator on a fixed interval until cancelled
pub async fn run_aggregation_service(
    aggregator: TierAggregator,
    interval: Duration,
    cancellation_token: CancellationToken,
) {
    info!("Starting tier aggregation service (interval: {:?})", interval);

    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Tier aggregation service shutting down");
                break;
            }
            _ = interval.tick() => {
                match aggregator.run_once().await {
                    Ok(report) if report.failed > 0 => warn!(
                        "Tier aggregation started at {} failed for {} of {} games ({}ms)",
                        report.started_at.to_rfc3339(),
                        report.failed,
                        report.games,
                        report.elapsed().num_milliseconds()
                    ),
                    Ok(report) => info!(
                        "Tier aggregation started at {} finished in {}ms: \
                         {} games aggregated, {} empty, {} tiers written, {} pruned",
                        report.started_at.to_rfc3339(),
                        report.elapsed().num_milliseconds(),
                        report.aggregated,
                        report.empty,
                        report.tiers_written,
                        report.tiers_pruned
                    ),
                    Err(e) => error!("Failed to run tier aggregation: {}", e),
                }
            }
        }
    }
}
