#![allow(dead_code)]

pub mod flaky_store;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use server::api::{ApiState, router};
use server::config::RankingConfig;
use server::db::{InMemoryScoreStore, ScoreStore};
use server::tier_aggregator::{AggregationReport, TierAggregator};

pub use flaky_store::FlakyStore;

/// In-process API backed by a score store, driven without a socket
pub struct TestApp {
    pub store: Arc<dyn ScoreStore>,
    pub config: RankingConfig,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).with_context(|| {
            format!(
                "Failed to decode response body: {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryScoreStore::new()), RankingConfig::default())
    }

    pub fn with_config(config: RankingConfig) -> Self {
        Self::with_store(Arc::new(InMemoryScoreStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn ScoreStore>, config: RankingConfig) -> Self {
        let router = router(ApiState::new(store.clone(), &config));
        Self {
            store,
            config,
            router,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<String>,
    ) -> Result<TestResponse> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(Body::from).unwrap_or_else(Body::empty))?;

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(TestResponse {
            status,
            body: body.to_vec(),
        })
    }

    pub async fn submit(&self, game: &str, player: &str, score: u64) -> Result<()> {
        let response = self
            .request(
                Method::PUT,
                &format!("/game/{}/player/{}/score", game, player),
                Some(format!(r#"{{"score": {}}}"#, score)),
            )
            .await?;
        anyhow::ensure!(
            response.status == StatusCode::OK,
            "submit for {} returned {}",
            player,
            response.status
        );
        Ok(())
    }

    pub async fn aggregate(&self) -> Result<AggregationReport> {
        Ok(TierAggregator::new(self.store.clone(), &self.config)
            .run_once()
            .await?)
    }
}

/// Percent-encode a query parameter value
pub fn encode_query(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
