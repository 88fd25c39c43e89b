use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::handlers::{collector, emitter, load};
use crate::AppState;

/// `/api/load` drives the pool, `/api/emitter` re-targets the interceptor,
/// `/api/collector` shows what arrived.
pub fn create_router(state: Arc<AppState>) -> Router {
    let collector_routes = Router::new()
        .route("/", get(collector::snapshot).delete(collector::reset))
        .route("/namespaces/:namespace", get(collector::namespace))
        .route("/tail", get(collector::tail));

    Router::new()
        .route(
            "/api/load",
            get(load::status).post(load::start).delete(load::stop),
        )
        .route("/api/emitter", get(emitter::show).put(emitter::update))
        .nest("/api/collector", collector_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
}
