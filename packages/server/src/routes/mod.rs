mod v1;

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::health;
use crate::state::AppState;

pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/v1", v1::routes())
        .nest("/health", health_routes())
}

fn health_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health::health))
        .routes(routes!(health::database_health))
}
