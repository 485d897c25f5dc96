//! Route modules for Folio Server

pub mod documents;
pub mod health;

use axum::{routing::get, Router};

use crate::state::AppState;

/// All application routes, without middleware
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .nest("/api/v1/documents", documents::router())
}
