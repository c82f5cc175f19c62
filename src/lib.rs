pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::state::AppState;

/// Router の構築
///
/// `/api/2fa/*` は呼び出し元サービスの認証キー（`x-service-key`）必須
pub fn create_router(state: AppState) -> Router {
    let two_factor = Router::new()
        .route("/api/2fa/setup", post(handlers::setup_2fa))
        .route("/api/2fa/activate", post(handlers::activate_2fa))
        .route("/api/2fa/deactivate", post(handlers::deactivate_2fa))
        .route("/api/2fa/verify", post(handlers::verify_2fa))
        .route(
            "/api/2fa/backup-codes/regenerate",
            post(handlers::regenerate_backup_codes),
        )
        .route("/api/2fa/status/{user_id}", get(handlers::status_2fa))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_service_key,
        ));

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .merge(two_factor)
        .with_state(state)
}
