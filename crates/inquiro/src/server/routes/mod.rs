//! API routes for the Inquiro server

pub mod pairs;
pub mod search;
pub mod source;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(search::search))
        .route("/source/:id", get(source::get_source))
        .route("/pairs", get(pairs::list_pairs))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "inquiro",
        "version": env!("CARGO_PKG_VERSION"),
        "ready": state.is_ready(),
        "description": "Question answering over a knowledge base extracted from email threads",
        "endpoints": {
            "POST /api/search": "Answer the latest chat message, with sources when the reply answers a question",
            "GET /api/source/:id": "HTML view of the email threads behind a knowledge pair",
            "GET /api/pairs": "List stored knowledge pairs and edges",
            "GET /api/info": "This document"
        }
    }))
}
