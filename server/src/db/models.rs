use serde::{Deserialize, Serialize};

use common::{PageCursor, tier_key};

/// A player's current score in one game. Keyed by (game, player), last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerScore {
    pub game: String,
    pub player: String,
    pub score: u64,
}

impl PlayerScore {
    pub fn new(game: impl Into<String>, player: impl Into<String>, score: u64) -> Self {
        Self {
            game: game.into(),
            player: player.into(),
            score,
        }
    }
}

impl From<PageCursor> for PlayerScore {
    fn from(cursor: PageCursor) -> Self {
        Self::new(cursor.game, cursor.player, cursor.score)
    }
}

impl From<&PlayerScore> for PageCursor {
    fn from(row: &PlayerScore) -> Self {
        PageCursor::new(row.game.clone(), row.player.clone(), row.score)
    }
}

/// Number of players whose score fell inside `[from_score, to_score]` when the
/// aggregator last ran for this game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierAggregate {
    pub game: String,
    pub from_score: u64,
    pub to_score: u64,
    pub count: u64,
}

impl TierAggregate {
    pub fn tier_key(&self) -> String {
        tier_key(self.from_score)
    }
}

/// One page of a descending score scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScorePage {
    pub items: Vec<PlayerScore>,
    /// Key of the last returned row; present only when more rows may follow
    pub last_evaluated: Option<PlayerScore>,
}
