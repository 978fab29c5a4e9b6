use tracing::{debug, warn};

use common::MAX_SCORE;

use crate::db::ScoreStore;
use crate::db::models::PlayerScore;
use crate::error::{Result, ScoreboardError};
use crate::validation::{validate_game_id, validate_player_id};

/// Record a player's score and make sure the game is known to the aggregator.
///
/// The score row and the registry row are two independent writes. A failed
/// registry write is logged and tolerated: the score is stored, the game is
/// only picked up by aggregation once a later submission registers it.
pub async fn submit_score(
    store: &dyn ScoreStore,
    game: &str,
    player: &str,
    score: u64,
) -> Result<()> {
    validate_game_id(game)?;
    validate_player_id(player)?;
    if score > MAX_SCORE {
        return Err(ScoreboardError::validation(format!(
            "score {} exceeds the maximum score {}",
            score, MAX_SCORE
        )));
    }

    store.put_score(&PlayerScore::new(game, player, score)).await?;

    if let Err(e) = store.register_game(game).await {
        warn!(
            "Stored score for {} in {} but failed to register the game: {}",
            player, game, e
        );
    }

    debug!("Recorded score {} for player {} in game {}", score, player, game);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryScoreStore;

    #[tokio::test]
    async fn test_submit_registers_game_once() {
        let store = InMemoryScoreStore::new();
        submit_score(&store, "g", "p1", 50).await.unwrap();
        submit_score(&store, "g", "p2", 1500).await.unwrap();
        submit_score(&store, "g", "p1", 75).await.unwrap();

        assert_eq!(store.list_games().await.unwrap(), vec!["g".to_string()]);
        assert_eq!(store.get_score("g", "p1").await.unwrap().unwrap().score, 75);
    }

    #[tokio::test]
    async fn test_submit_rejects_reserved_ids_and_large_scores() {
        let store = InMemoryScoreStore::new();

        for (game, player, score) in [
            ("games", "p1", 1),
            ("g", "tier#0", 1),
            ("g", "p1", MAX_SCORE + 1),
        ] {
            let err = submit_score(&store, game, player, score).await.unwrap_err();
            assert!(matches!(err, ScoreboardError::Validation(_)));
        }
        assert!(store.list_games().await.unwrap().is_empty());
    }
}
