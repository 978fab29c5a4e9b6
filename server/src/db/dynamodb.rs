use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, DeleteRequest, GlobalSecondaryIndex,
    KeySchemaElement, KeyType, Projection, ProjectionType, ScalarAttributeType, Select,
    TableStatus, WriteRequest,
};
use tracing::{debug, info, warn};

use common::{GAMES_REGISTRY_KEY, TIER_KEY_PREFIX};

use super::models::*;
use super::{ScoreStore, StoreResult};
use crate::config::StoreConfig;
use crate::error::StoreError;

// Single table layout. PlayerScore rows carry `score`, TierAggregate rows carry
// `from_score`; both index sort keys are sparse so the indexes never mix rows.
const PARTITION_KEY: &str = "toplist_pk";
const SORT_KEY: &str = "toplist_sk";
const SCORE: &str = "score";
const FROM_SCORE: &str = "from_score";
const TO_SCORE: &str = "to_score";
const COUNT: &str = "count";

const SCORE_INDEX: &str = "game-score-index";
const TIER_INDEX: &str = "game-tier-index";

/// BatchWriteItem accepts at most 25 requests
const BATCH_WRITE_LIMIT: usize = 25;
const BATCH_WRITE_ATTEMPTS: usize = 5;

type Item = HashMap<String, AttributeValue>;

pub struct DynamoScoreStore {
    client: Client,
    table_name: String,
    closed: AtomicBool,
}

impl DynamoScoreStore {
    pub async fn open(config: &StoreConfig) -> anyhow::Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            info!("Using DynamoDB endpoint override: {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }
        let client = Client::from_conf(builder.build());

        info!("Initialized DynamoDB client for table: {}", config.table_name);

        let store = Self::with_client(client, config.table_name.clone());
        store.ensure_table_exists().await?;

        Ok(store)
    }

    fn with_client(client: Client, table_name: String) -> Self {
        Self {
            client,
            table_name,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable(anyhow!(
                "score store for table {} is closed",
                self.table_name
            )));
        }
        Ok(())
    }

    async fn ensure_table_exists(&self) -> anyhow::Result<()> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => {
                debug!("Table {} already exists", self.table_name);
                return Ok(());
            }
            Err(e) => {
                debug!(
                    "Table {} does not exist (error: {}), creating it",
                    self.table_name, e
                );
            }
        }

        info!("Creating DynamoDB table: {}", self.table_name);

        let pk_attr = Self::attribute(PARTITION_KEY, ScalarAttributeType::S)?;
        let sk_attr = Self::attribute(SORT_KEY, ScalarAttributeType::S)?;
        let score_attr = Self::attribute(SCORE, ScalarAttributeType::N)?;
        let from_score_attr = Self::attribute(FROM_SCORE, ScalarAttributeType::N)?;

        let score_index = Self::index(SCORE_INDEX, SCORE)?;
        let tier_index = Self::index(TIER_INDEX, FROM_SCORE)?;

        self.client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(pk_attr)
            .attribute_definitions(sk_attr)
            .attribute_definitions(score_attr)
            .attribute_definitions(from_score_attr)
            .key_schema(Self::key(PARTITION_KEY, KeyType::Hash)?)
            .key_schema(Self::key(SORT_KEY, KeyType::Range)?)
            .global_secondary_indexes(score_index)
            .global_secondary_indexes(tier_index)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .context("Failed to create score table")?;

        self.wait_for_active().await?;
        info!("Successfully created score table: {}", self.table_name);
        Ok(())
    }

    async fn wait_for_active(&self) -> anyhow::Result<()> {
        for _ in 0..60 {
            let description = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .context("Failed to describe score table")?;

            let status = description.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }
            debug!("Waiting for table {} to become active ({:?})", self.table_name, status);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Err(anyhow!("Table {} did not become active", self.table_name))
    }

    fn attribute(name: &str, kind: ScalarAttributeType) -> anyhow::Result<AttributeDefinition> {
        AttributeDefinition::builder()
            .attribute_name(name)
            .attribute_type(kind)
            .build()
            .with_context(|| format!("Failed to build {} attribute", name))
    }

    fn key(name: &str, kind: KeyType) -> anyhow::Result<KeySchemaElement> {
        KeySchemaElement::builder()
            .attribute_name(name)
            .key_type(kind)
            .build()
            .with_context(|| format!("Failed to build {} key", name))
    }

    fn index(name: &str, sort_key: &str) -> anyhow::Result<GlobalSecondaryIndex> {
        GlobalSecondaryIndex::builder()
            .index_name(name)
            .key_schema(Self::key(PARTITION_KEY, KeyType::Hash)?)
            .key_schema(Self::key(sort_key, KeyType::Range)?)
            .projection(
                Projection::builder()
                    .projection_type(ProjectionType::All)
                    .build(),
            )
            .build()
            .with_context(|| format!("Failed to build {} index", name))
    }

    fn av_s(s: impl Into<String>) -> AttributeValue {
        AttributeValue::S(s.into())
    }

    fn av_n(n: impl ToString) -> AttributeValue {
        AttributeValue::N(n.to_string())
    }

    fn extract_string(item: &Item, key: &str) -> Option<String> {
        item.get(key).and_then(|v| v.as_s().ok()).cloned()
    }

    fn extract_number(item: &Item, key: &str) -> Option<u64> {
        item.get(key)
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<u64>().ok())
    }

    fn score_key(row: &PlayerScore) -> Item {
        HashMap::from([
            (PARTITION_KEY.to_string(), Self::av_s(&row.game)),
            (SORT_KEY.to_string(), Self::av_s(&row.player)),
            (SCORE.to_string(), Self::av_n(row.score)),
        ])
    }

    fn parse_score(item: &Item) -> anyhow::Result<PlayerScore> {
        Ok(PlayerScore {
            game: Self::extract_string(item, PARTITION_KEY)
                .ok_or_else(|| anyhow!("score row without {}", PARTITION_KEY))?,
            player: Self::extract_string(item, SORT_KEY)
                .ok_or_else(|| anyhow!("score row without {}", SORT_KEY))?,
            score: Self::extract_number(item, SCORE)
                .ok_or_else(|| anyhow!("score row without numeric {}", SCORE))?,
        })
    }

    fn parse_tier(item: &Item) -> anyhow::Result<TierAggregate> {
        Ok(TierAggregate {
            game: Self::extract_string(item, PARTITION_KEY)
                .ok_or_else(|| anyhow!("tier row without {}", PARTITION_KEY))?,
            from_score: Self::extract_number(item, FROM_SCORE)
                .ok_or_else(|| anyhow!("tier row without numeric {}", FROM_SCORE))?,
            to_score: Self::extract_number(item, TO_SCORE)
                .ok_or_else(|| anyhow!("tier row without numeric {}", TO_SCORE))?,
            count: Self::extract_number(item, COUNT)
                .ok_or_else(|| anyhow!("tier row without numeric {}", COUNT))?,
        })
    }

    /// Query the tier index, following every page
    async fn query_tier_index(
        &self,
        game: &str,
        above: Option<u64>,
    ) -> anyhow::Result<Vec<TierAggregate>> {
        let condition = match above {
            Some(_) => "#pk = :game AND #from > :score",
            None => "#pk = :game",
        };

        let mut tiers = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(TIER_INDEX)
                .key_condition_expression(condition)
                .expression_attribute_names("#pk", PARTITION_KEY)
                .expression_attribute_values(":game", Self::av_s(game))
                .scan_index_forward(true)
                .set_exclusive_start_key(start_key.take());
            if let Some(score) = above {
                request = request
                    .expression_attribute_names("#from", FROM_SCORE)
                    .expression_attribute_values(":score", Self::av_n(score));
            }

            let response = request.send().await.context("Failed to query tiers")?;
            for item in response.items.unwrap_or_default() {
                tiers.push(Self::parse_tier(&item)?);
            }

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Ok(tiers)
    }

    /// Delete rows by key, retrying whatever DynamoDB leaves unprocessed
    async fn batch_delete(&self, keys: Vec<Item>) -> anyhow::Result<()> {
        for chunk in keys.chunks(BATCH_WRITE_LIMIT) {
            let mut requests = chunk
                .iter()
                .map(|key| {
                    DeleteRequest::builder()
                        .set_key(Some(key.clone()))
                        .build()
                        .map(|delete| WriteRequest::builder().delete_request(delete).build())
                        .context("Failed to build delete request")
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            for attempt in 1..=BATCH_WRITE_ATTEMPTS {
                let response = self
                    .client
                    .batch_write_item()
                    .request_items(&self.table_name, requests)
                    .send()
                    .await
                    .context("Failed to batch delete tiers")?;

                requests = response
                    .unprocessed_items
                    .and_then(|mut unprocessed| unprocessed.remove(&self.table_name))
                    .unwrap_or_default();
                if requests.is_empty() {
                    break;
                }
                if attempt == BATCH_WRITE_ATTEMPTS {
                    return Err(anyhow!(
                        "{} tier deletes left unprocessed after {} attempts",
                        requests.len(),
                        attempt
                    ));
                }
                warn!("{} tier deletes unprocessed, retrying", requests.len());
                tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for DynamoScoreStore {
    async fn put_score(&self, row: &PlayerScore) -> StoreResult<()> {
        self.ensure_open()?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::score_key(row)))
            .send()
            .await
            .context("Failed to put player score")?;
        Ok(())
    }

    async fn get_score(&self, game: &str, player: &str) -> StoreResult<Option<PlayerScore>> {
        self.ensure_open()?;
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, Self::av_s(game))
            .key(SORT_KEY, Self::av_s(player))
            .consistent_read(true)
            .send()
            .await
            .context("Failed to get player score")?;

        match response.item {
            Some(item) => Ok(Some(Self::parse_score(&item)?)),
            None => Ok(None),
        }
    }

    async fn query_by_score_desc(
        &self,
        game: &str,
        limit: usize,
        start: Option<&PlayerScore>,
    ) -> StoreResult<ScorePage> {
        self.ensure_open()?;
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let response = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(SCORE_INDEX)
            .key_condition_expression("#pk = :game")
            .expression_attribute_names("#pk", PARTITION_KEY)
            .expression_attribute_values(":game", Self::av_s(game))
            .scan_index_forward(false)
            .limit(limit)
            .set_exclusive_start_key(start.map(Self::score_key))
            .send()
            .await
            .context("Failed to query scores")?;

        let items = response
            .items
            .unwrap_or_default()
            .iter()
            .map(Self::parse_score)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let last_evaluated = match response.last_evaluated_key {
            Some(key) if !key.is_empty() => Some(Self::parse_score(&key)?),
            _ => None,
        };

        Ok(ScorePage {
            items,
            last_evaluated,
        })
    }

    async fn count_by_score_range(
        &self,
        game: &str,
        low: u64,
        high: Option<u64>,
    ) -> StoreResult<u64> {
        self.ensure_open()?;
        if high.is_some_and(|high| high < low) {
            return Ok(0);
        }
        let condition = match high {
            Some(_) => "#pk = :game AND #score BETWEEN :low AND :high",
            None => "#pk = :game AND #score >= :low",
        };

        // Count queries are paged by the 1 MB read limit like any other query
        let mut total = 0u64;
        let mut start_key: Option<Item> = None;
        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(SCORE_INDEX)
                .key_condition_expression(condition)
                .expression_attribute_names("#pk", PARTITION_KEY)
                .expression_attribute_names("#score", SCORE)
                .expression_attribute_values(":game", Self::av_s(game))
                .expression_attribute_values(":low", Self::av_n(low))
                .select(Select::Count)
                .set_exclusive_start_key(start_key.take());
            if let Some(high) = high {
                request = request.expression_attribute_values(":high", Self::av_n(high));
            }

            let response = request.send().await.context("Failed to count scores")?;
            total += u64::try_from(response.count).unwrap_or(0);

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Ok(total)
    }

    async fn put_tier(&self, tier: &TierAggregate) -> StoreResult<()> {
        self.ensure_open()?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(PARTITION_KEY, Self::av_s(&tier.game))
            .item(SORT_KEY, Self::av_s(tier.tier_key()))
            .item(FROM_SCORE, Self::av_n(tier.from_score))
            .item(TO_SCORE, Self::av_n(tier.to_score))
            .item(COUNT, Self::av_n(tier.count))
            .send()
            .await
            .context("Failed to put tier aggregate")?;
        Ok(())
    }

    async fn query_tiers_above(&self, game: &str, score: u64) -> StoreResult<Vec<TierAggregate>> {
        self.ensure_open()?;
        Ok(self.query_tier_index(game, Some(score)).await?)
    }

    async fn query_tiers(&self, game: &str) -> StoreResult<Vec<TierAggregate>> {
        self.ensure_open()?;
        Ok(self.query_tier_index(game, None).await?)
    }

    async fn delete_tier(&self, game: &str, from_score: u64) -> StoreResult<()> {
        self.ensure_open()?;
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, Self::av_s(game))
            .key(SORT_KEY, Self::av_s(common::tier_key(from_score)))
            .send()
            .await
            .context("Failed to delete tier aggregate")?;
        Ok(())
    }

    async fn delete_tiers(&self, game: &str) -> StoreResult<u64> {
        self.ensure_open()?;
        // Tier rows are found through the reserved sort key prefix on the base table
        let mut keys = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let response = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#pk = :game AND begins_with(#sk, :prefix)")
                .expression_attribute_names("#pk", PARTITION_KEY)
                .expression_attribute_names("#sk", SORT_KEY)
                .expression_attribute_values(":game", Self::av_s(game))
                .expression_attribute_values(":prefix", Self::av_s(TIER_KEY_PREFIX))
                .projection_expression("#pk, #sk")
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .context("Failed to query tier keys")?;

            keys.extend(response.items.unwrap_or_default());

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        let deleted = keys.len() as u64;
        self.batch_delete(keys).await?;
        Ok(deleted)
    }

    async fn register_game(&self, game: &str) -> StoreResult<()> {
        self.ensure_open()?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(PARTITION_KEY, Self::av_s(GAMES_REGISTRY_KEY))
            .item(SORT_KEY, Self::av_s(game))
            .send()
            .await
            .context("Failed to register game")?;
        Ok(())
    }

    async fn list_games(&self) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        let mut games = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let response = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#pk = :games")
                .expression_attribute_names("#pk", PARTITION_KEY)
                .expression_attribute_values(":games", Self::av_s(GAMES_REGISTRY_KEY))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .context("Failed to list games")?;

            games.extend(
                response
                    .items
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|item| Self::extract_string(item, SORT_KEY)),
            );

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Ok(games)
    }

    async fn close(&self) -> StoreResult<()> {
        info!("Closing DynamoDB score store for table {}", self.table_name);
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::config::Region;

    use super::*;

    fn offline_store() -> DynamoScoreStore {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        DynamoScoreStore::with_client(Client::from_conf(config), "scores".to_string())
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations_without_calling_dynamodb() {
        let store = offline_store();
        store.close().await.unwrap();

        let err = store.get_score("g", "p1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        let err = store
            .put_score(&PlayerScore::new("g", "p1", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        let err = store.list_games().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
