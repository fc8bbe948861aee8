//! Maintenance of the derived `restaurant.average_rating` column.
//!
//! Every review write is followed by an explicit call to
//! [`RatingService::recompute`]. The recomputation is a second write outside
//! the review's own transaction; if it fails the stored average stays stale
//! until the next successful recomputation.

mod store;

use std::sync::Arc;

use common::RetryPolicy;
use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::DbErr;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use crate::database::retry_db;

pub use store::{RatedRestaurant, RatingStore, SeaOrmRatingStore, count_reviews};

/// Fractional digits of a stored average.
const SCALE: u32 = 2;

/// Mean of `ratings` rounded half-up to 2 decimals, `0.00` when empty.
pub fn average_rating(ratings: &[i32]) -> Decimal {
    if ratings.is_empty() {
        return Decimal::new(0, SCALE);
    }

    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    let mean = Decimal::from(sum) / Decimal::from(ratings.len());

    let mut rounded = mean.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(SCALE);
    rounded
}

/// Recomputes and persists restaurant averages.
///
/// Recomputations of the same restaurant are serialized, so a recomputation
/// always reads the reviews committed before it started and no concurrent
/// writer can overwrite its result with an older snapshot.
#[derive(Clone)]
pub struct RatingService {
    store: Arc<dyn RatingStore>,
    retry: RetryPolicy,
    locks: Arc<DashMap<i32, Arc<Mutex<()>>>>,
}

impl RatingService {
    pub fn new(store: Arc<dyn RatingStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &dyn RatingStore {
        self.store.as_ref()
    }

    /// Recalculate the average of one restaurant and write it back.
    ///
    /// Returns `None` when the restaurant does not exist (e.g. deleted
    /// concurrently); that is not an error.
    #[instrument(skip(self))]
    pub async fn recompute(&self, restaurant_id: i32) -> Result<Option<Decimal>, DbErr> {
        let lock = self
            .locks
            .entry(restaurant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.recompute_locked(restaurant_id).await
        };

        drop(lock);
        self.locks
            .remove_if(&restaurant_id, |_, l| Arc::strong_count(l) == 1);

        result
    }

    async fn recompute_locked(&self, restaurant_id: i32) -> Result<Option<Decimal>, DbErr> {
        let store = self.store.as_ref();

        let found = retry_db(&self.retry, || store.find_restaurant(restaurant_id)).await?;
        if found.is_none() {
            debug!(restaurant_id, "Restaurant not found, skipping recomputation");
            return Ok(None);
        }

        let review_count =
            retry_db(&self.retry, || store.count_reviews_for_restaurant(restaurant_id)).await?;
        let ratings = if review_count == 0 {
            Vec::new()
        } else {
            retry_db(&self.retry, || store.find_review_ratings(restaurant_id)).await?
        };
        let average = average_rating(&ratings);

        let updated = retry_db(&self.retry, || {
            store.update_restaurant_average(restaurant_id, average)
        })
        .await?;
        if !updated {
            debug!(restaurant_id, "Restaurant deleted before its average was written");
            return Ok(None);
        }

        info!(
            restaurant_id,
            review_count = ratings.len(),
            average_rating = %average,
            "Recomputed average rating"
        );
        Ok(Some(average))
    }

    /// Recompute after a committed review write.
    ///
    /// A failure here leaves the review persisted with a stale average, so it
    /// is logged as a consistency divergence before being returned.
    pub async fn refresh_after_review_write(
        &self,
        restaurant_id: i32,
    ) -> Result<Option<Decimal>, DbErr> {
        self.recompute(restaurant_id).await.inspect_err(|e| {
            error!(
                restaurant_id,
                error = %e,
                "Review write committed but average_rating recomputation failed; stored average is stale"
            );
        })
    }

    /// Recompute every active restaurant, one after another.
    ///
    /// Failures are logged and skipped. Returns how many restaurants were updated.
    #[instrument(skip(self))]
    pub async fn recompute_all(&self) -> Result<usize, DbErr> {
        let store = self.store.as_ref();
        let ids = retry_db(&self.retry, || store.active_restaurant_ids()).await?;

        let mut processed = 0;
        for id in &ids {
            match self.recompute(*id).await {
                Ok(Some(_)) => processed += 1,
                Ok(None) => {}
                Err(e) => error!(restaurant_id = id, error = %e, "Recomputation failed"),
            }
        }

        info!(processed, total = ids.len(), "Recomputed active restaurants");
        Ok(processed)
    }
}
