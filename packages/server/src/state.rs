use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::listing::ListingCache;
use crate::rating::{RatingService, SeaOrmRatingStore};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub ratings: RatingService,
    pub listings: ListingCache,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        let ratings = RatingService::new(
            Arc::new(SeaOrmRatingStore::new(db.clone())),
            config.retry.clone(),
        );
        let listings = ListingCache::new(&config.cache);
        Self {
            db,
            config: Arc::new(config),
            ratings,
            listings,
            started_at: Instant::now(),
        }
    }
}
