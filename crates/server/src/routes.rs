//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::middleware::request_context_middleware;
use crate::ratelimit::{adopt_rate_limit_middleware, create_rate_limit_middleware};
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let rate_limit_state = state.rate_limit.clone();

    // Session creation and adoption are the only rate limited operations.
    let create_route = Router::new()
        .route("/api/create.php", post(handlers::create_session))
        .route_layer(middleware::from_fn_with_state(
            rate_limit_state.clone(),
            create_rate_limit_middleware,
        ));
    let adopt_route = Router::new()
        .route("/api/adopt.php", post(handlers::adopt_share))
        .route_layer(middleware::from_fn_with_state(
            rate_limit_state,
            adopt_rate_limit_middleware,
        ));

    let api_routes = Router::new()
        .route("/api/post.php", post(handlers::post_location))
        .route("/api/fetch.php", get(handlers::fetch_share))
        .route("/api/stop.php", post(handlers::stop_session))
        .route("/api/new-link.php", post(handlers::new_link))
        // Health check (intentionally unauthenticated for load balancers and k8s)
        .route("/api/health", get(handlers::health_check))
        .route("/dynamic.js.php", get(handlers::viewer_settings));

    let mut router = Router::new()
        .merge(create_route)
        .merge(adopt_route)
        .merge(api_routes);

    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    // See crate::metrics module documentation for details.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Order of execution: TraceLayer -> request context -> rate limit (per route) -> Handler
    router
        .layer(middleware::from_fn(request_context_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
