use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use tracing::info;

use common::{PlayerRankResponse, ScoreSubmission, ScoreboardResponse};

use super::error::AppError;
use super::server::ApiState;
use crate::error::ScoreboardError;
use crate::scoreboard::PageRequest;
use crate::submission::submit_score;
use crate::tiers::delete_tier_aggregates;

/// Record a player's score
/// Body: `{"score": <non-negative integer>}`
pub async fn put_player_score(
    State(state): State<ApiState>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let Path((game, player)) = path?;
    let submission = ScoreSubmission::parse(&body)
        .map_err(|e| ScoreboardError::validation(e.to_string()))?;

    submit_score(state.store.as_ref(), &game, &player, submission.score).await?;
    Ok(StatusCode::OK)
}

/// Get a player's score and global rank
pub async fn get_player_score(
    State(state): State<ApiState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<PlayerRankResponse>, AppError> {
    let Path((game, player)) = path?;
    Ok(Json(state.rank_resolver.resolve(&game, &player).await?))
}

/// Get one page of a game's scoreboard
/// Query parameters:
/// - page_size: optional, defaults to the configured page size
/// - next_page: optional, the `next_page` string of the previous response
/// - last_rank: optional, the `last_rank` of the previous response
pub async fn get_scoreboard(
    State(state): State<ApiState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> Result<Json<ScoreboardResponse>, AppError> {
    let Path(game) = path?;
    let Query(request) = query?;
    Ok(Json(state.paginator.page(&game, &request).await?))
}

/// Delete all tier aggregates of a game, e.g. before changing the tier width
pub async fn delete_tiers(
    State(state): State<ApiState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(game) = path?;
    let deleted = delete_tier_aggregates(state.store.as_ref(), &game).await?;
    info!("Tier reset requested for game {} ({} rows removed)", game, deleted);
    Ok(StatusCode::OK)
}
