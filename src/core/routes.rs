// HTTP routes configuration

use crate::core::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/:passkey/announce",
            get(crate::handlers::announce::announce_handler),
        )
        .route(
            "/:passkey/scrape",
            get(crate::handlers::scrape::scrape_handler),
        )
        .with_state(state)
}
