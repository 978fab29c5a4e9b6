use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    routing::{delete, get},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::leaderboard;
use crate::config::RankingConfig;
use crate::db::ScoreStore;
use crate::rank_resolver::RankResolver;
use crate::scoreboard::ScoreboardPaginator;

/// Shared handler state. Everything in it is built once at startup around a
/// single store handle.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn ScoreStore>,
    pub rank_resolver: Arc<RankResolver>,
    pub paginator: Arc<ScoreboardPaginator>,
}

impl ApiState {
    pub fn new(store: Arc<dyn ScoreStore>, config: &RankingConfig) -> Self {
        Self {
            rank_resolver: Arc::new(RankResolver::new(store.clone(), config)),
            paginator: Arc::new(ScoreboardPaginator::new(store.clone(), config)),
            store,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/game/:game/player/:player/score",
            get(leaderboard::get_player_score)
                .put(leaderboard::put_player_score)
                .post(leaderboard::put_player_score),
        )
        .route("/game/:game/scoreboard", get(leaderboard::get_scoreboard))
        .route("/game/:game/tiers", delete(leaderboard::delete_tiers))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn run_api_server(
    addr: &str,
    state: ApiState,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancellation_token.cancelled().await;
            info!("API server received shutdown signal");
        })
        .await
        .map_err(|e| anyhow::anyhow!("API server error: {}", e))
}

async fn health_check() -> &'static str {
    "OK"
}
