use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use common::{PageCursor, ScoreboardResponse, ToplistEntry};

use crate::config::RankingConfig;
use crate::db::ScoreStore;
use crate::db::models::PlayerScore;
use crate::error::{Result, ScoreboardError};
use crate::validation::validate_game_id;

/// Query parameters of `GET /game/{game}/scoreboard`. Kept as raw strings so
/// empty values fall back to defaults and bad values become validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageRequest {
    pub page_size: Option<String>,
    /// Cursor string returned as `next_page` by the previous page
    pub next_page: Option<String>,
    /// Rank of the last row of the previous page. Trusted as given.
    pub last_rank: Option<String>,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size: Some(page_size.to_string()),
            ..Self::default()
        }
    }

    /// Request for the page following `response`
    pub fn after(response: &ScoreboardResponse, page_size: usize) -> Self {
        Self {
            page_size: Some(page_size.to_string()),
            next_page: response.next_page.clone(),
            last_rank: Some(response.last_rank.to_string()),
        }
    }
}

/// Serves descending score pages of one game
pub struct ScoreboardPaginator {
    store: Arc<dyn ScoreStore>,
    default_page_size: usize,
    max_page_size: usize,
}

impl ScoreboardPaginator {
    pub fn new(store: Arc<dyn ScoreStore>, config: &RankingConfig) -> Self {
        Self {
            store,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    pub async fn page(&self, game: &str, request: &PageRequest) -> Result<ScoreboardResponse> {
        validate_game_id(game)?;

        let page_size = parse_param::<usize>("page_size", request.page_size.as_deref())?
            .unwrap_or(self.default_page_size);
        if page_size == 0 || page_size > self.max_page_size {
            return Err(ScoreboardError::validation(format!(
                "page_size must be between 1 and {}",
                self.max_page_size
            )));
        }

        let last_rank = parse_param::<u64>("last_rank", request.last_rank.as_deref())?.unwrap_or(0);
        if last_rank.checked_add(page_size as u64).is_none() {
            return Err(ScoreboardError::validation("last_rank is out of range"));
        }

        let start = match request.next_page.as_deref() {
            Some(raw) if !raw.is_empty() => Some(decode_cursor(game, raw)?),
            _ => None,
        };

        let page = self
            .store
            .query_by_score_desc(game, page_size, start.as_ref())
            .await?;

        let toplist: Vec<ToplistEntry> = page
            .items
            .into_iter()
            .zip(last_rank + 1..)
            .map(|(row, rank)| ToplistEntry {
                rank,
                player: row.player,
                score: row.score,
            })
            .collect();

        Ok(ScoreboardResponse {
            game: game.to_string(),
            last_rank: toplist.last().map_or(last_rank, |entry| entry.rank),
            toplist,
            next_page: page
                .last_evaluated
                .as_ref()
                .map(|row| PageCursor::from(row).encode()),
        })
    }
}

fn decode_cursor(game: &str, raw: &str) -> Result<PlayerScore> {
    let cursor = PageCursor::decode(raw).map_err(|e| ScoreboardError::validation(e.to_string()))?;
    if cursor.game != game {
        return Err(ScoreboardError::validation(format!(
            "page cursor belongs to game {:?}, not {:?}",
            cursor.game, game
        )));
    }
    Ok(cursor.into())
}

fn parse_param<T: FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(|_| {
            ScoreboardError::validation(format!(
                "{} must be a non-negative integer, got {:?}",
                name, value
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryScoreStore;
    use crate::submission::submit_score;

    async fn paginator(scores: &[(&str, u64)]) -> ScoreboardPaginator {
        let store: Arc<dyn ScoreStore> = Arc::new(InMemoryScoreStore::new());
        for (player, score) in scores {
            submit_score(store.as_ref(), "g", player, *score).await.unwrap();
        }
        ScoreboardPaginator::new(store, &RankingConfig::default())
    }

    fn players(response: &ScoreboardResponse) -> Vec<(u64, &str, u64)> {
        response
            .toplist
            .iter()
            .map(|e| (e.rank, e.player.as_str(), e.score))
            .collect()
    }

    #[tokio::test]
    async fn test_pages_follow_cursor() {
        let paginator = paginator(&[("p1", 50), ("p2", 1500), ("p3", 2500)]).await;

        let first = paginator.page("g", &PageRequest::first(2)).await.unwrap();
        assert_eq!(players(&first), [(1, "p3", 2500), (2, "p2", 1500)]);
        assert_eq!(first.last_rank, 2);
        assert_eq!(
            first.next_page.as_deref(),
            Some(r#"{"game":"g","player":"p2","score":1500}"#)
        );

        let second = paginator
            .page("g", &PageRequest::after(&first, 2))
            .await
            .unwrap();
        assert_eq!(players(&second), [(3, "p1", 50)]);
        assert_eq!(second.last_rank, 3);
        assert!(second.next_page.is_none());
    }

    #[tokio::test]
    async fn test_default_page_size_and_empty_params() {
        let paginator = paginator(&[("p1", 50)]).await;
        let request = PageRequest {
            page_size: Some(String::new()),
            next_page: Some(String::new()),
            last_rank: Some(String::new()),
        };

        let page = paginator.page("g", &request).await.unwrap();
        assert_eq!(players(&page), [(1, "p1", 50)]);
    }

    #[tokio::test]
    async fn test_empty_game_echoes_last_rank() {
        let paginator = paginator(&[]).await;
        let request = PageRequest {
            last_rank: Some("7".to_string()),
            ..PageRequest::default()
        };

        let page = paginator.page("g", &request).await.unwrap();
        assert!(page.toplist.is_empty());
        assert_eq!(page.last_rank, 7);
        assert!(page.next_page.is_none());
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let paginator = paginator(&[("p1", 50)]).await;
        let requests = [
            PageRequest {
                next_page: Some("not-a-cursor".to_string()),
                ..PageRequest::default()
            },
            PageRequest {
                next_page: Some(PageCursor::new("other", "p1", 50).encode()),
                ..PageRequest::default()
            },
            PageRequest {
                page_size: Some("0".to_string()),
                ..PageRequest::default()
            },
            PageRequest {
                page_size: Some("5000".to_string()),
                ..PageRequest::default()
            },
            PageRequest {
                last_rank: Some("-1".to_string()),
                ..PageRequest::default()
            },
            PageRequest {
                last_rank: Some(u64::MAX.to_string()),
                ..PageRequest::default()
            },
        ];

        for request in &requests {
            let err = paginator.page("g", request).await.unwrap_err();
            assert!(
                matches!(err, ScoreboardError::Validation(_)),
                "expected {:?} to be rejected",
                request
            );
        }
    }
}
