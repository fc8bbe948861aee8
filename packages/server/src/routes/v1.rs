use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::{admin, restaurant, review};
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/restaurants", restaurant_routes())
        .nest("/reviews", review_routes())
        .nest("/admin", admin_routes())
}

fn restaurant_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            restaurant::list_restaurants,
            restaurant::create_restaurant
        ))
        .routes(routes!(restaurant::get_stats))
        .routes(routes!(restaurant::top_rated))
        .routes(routes!(restaurant::list_by_category))
        .routes(routes!(
            restaurant::get_restaurant,
            restaurant::replace_restaurant,
            restaurant::update_restaurant,
            restaurant::delete_restaurant
        ))
        .routes(routes!(restaurant::purge_restaurant))
        .routes(routes!(restaurant::restore_restaurant))
        .routes(routes!(
            review::list_restaurant_reviews,
            review::create_review
        ))
}

fn review_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(review::list_reviews))
        .routes(routes!(
            review::get_review,
            review::update_review,
            review::delete_review
        ))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(admin::recompute_all))
        .routes(routes!(admin::recompute_one))
}
