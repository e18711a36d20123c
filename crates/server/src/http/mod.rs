use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{AppState, routes};

mod auth;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::accounts::router(&state))
        .merge(routes::images::router(&state))
        .layer(from_fn_with_state(state.clone(), auth::require_api_auth));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
