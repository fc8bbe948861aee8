pub mod cache;
pub mod category;
pub mod config;
pub mod retry;

pub use cache::TtlCache;
pub use category::{Category, ParseCategoryError};
pub use config::{CacheConfig, RetryPolicy};
pub use retry::with_retry;
