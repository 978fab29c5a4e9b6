use common::{GAMES_REGISTRY_KEY, TIER_KEY_PREFIX};

use crate::error::{Result, ScoreboardError};

/// Game ids share the partition key space with the game registry
pub fn validate_game_id(game: &str) -> Result<()> {
    if game.trim().is_empty() {
        return Err(ScoreboardError::validation("game id must not be empty"));
    }
    if game == GAMES_REGISTRY_KEY {
        return Err(ScoreboardError::validation(format!(
            "game id {:?} is reserved",
            GAMES_REGISTRY_KEY
        )));
    }
    Ok(())
}

/// Player ids share the sort key space with tier aggregate rows
pub fn validate_player_id(player: &str) -> Result<()> {
    if player.trim().is_empty() {
        return Err(ScoreboardError::validation("player id must not be empty"));
    }
    if player.starts_with(TIER_KEY_PREFIX) {
        return Err(ScoreboardError::validation(format!(
            "player ids starting with {:?} are reserved",
            TIER_KEY_PREFIX
        )));
    }
    Ok(())
}
