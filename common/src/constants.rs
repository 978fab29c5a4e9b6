/// Largest score accepted anywhere in the system (2^53 - 1).
/// Every value up to this bound is exactly representable as a JSON number
/// by clients that decode numbers as IEEE doubles.
pub const MAX_SCORE: u64 = 9_007_199_254_740_991;

/// Default width of a score tier in score units
pub const DEFAULT_TIER_WIDTH: u64 = 1000;

/// Default number of scoreboard rows per page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Upper bound for a client supplied page size
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// Default interval between tier aggregation runs in seconds
pub const DEFAULT_AGGREGATION_INTERVAL_SECS: u64 = 60;

/// Partition key of the game registry rows
pub const GAMES_REGISTRY_KEY: &str = "games";

/// Sort key prefix reserved for tier aggregate rows
pub const TIER_KEY_PREFIX: &str = "tier#";

/// Sort key of the aggregate row for the tier starting at `from_score`
pub fn tier_key(from_score: u64) -> String {
    format!("{}{}", TIER_KEY_PREFIX, from_score)
}
