use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MAX_SCORE;

/// Position of the last row of a scoreboard page.
///
/// On the wire the cursor is the compact JSON text
/// `{"game":"...","player":"...","score":123}` carried as a string, both in
/// the `next_page` query parameter and in the response body. Clients hand it
/// back untouched, so [`PageCursor::encode`] must be stable: the same cursor
/// always encodes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageCursor {
    pub game: String,
    pub player: String,
    pub score: u64,
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("malformed page cursor: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("page cursor score {0} exceeds the maximum score")]
    ScoreOutOfRange(u64),
}

impl PageCursor {
    pub fn new(game: impl Into<String>, player: impl Into<String>, score: u64) -> Self {
        Self {
            game: game.into(),
            player: player.into(),
            score,
        }
    }

    pub fn encode(&self) -> String {
        serde_json::json!({
            "game": self.game,
            "player": self.player,
            "score": self.score,
        })
        .to_string()
    }

    pub fn decode(raw: &str) -> Result<Self, CursorError> {
        let cursor: PageCursor = serde_json::from_str(raw)?;
        if cursor.score > MAX_SCORE {
            return Err(CursorError::ScoreOutOfRange(cursor.score));
        }
        Ok(cursor)
    }
}
