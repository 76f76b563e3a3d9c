//! API routes module

pub mod ucp;

use std::sync::Arc;

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<AppState>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // UCP proxy and inspector routes
        .nest("/ucp", ucp::router())
}
