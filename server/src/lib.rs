pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod rank_resolver;
pub mod scoreboard;
pub mod submission;
pub mod tier_aggregator;
pub mod tiers;
pub mod validation;
