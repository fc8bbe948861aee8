use serde::Deserialize;

/// Backoff policy shared by every retried store operation.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds. Default: 500.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt. Default: 2.0.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// Listing response cache configuration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    /// Lifetime of a cached listing, in seconds. Default: 300.
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,
    /// How often expired entries are swept, in seconds. Default: 60.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Clear cached listings whenever a restaurant or review is written.
    /// When false, listings may be stale for up to `listing_ttl_secs`. Default: true.
    #[serde(default = "default_invalidate_on_write")]
    pub invalidate_on_write: bool,
}

fn default_listing_ttl_secs() -> u64 {
    300
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_invalidate_on_write() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl_secs: default_listing_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            invalidate_on_write: default_invalidate_on_write(),
        }
    }
}
