//! Stored knowledge listing for debugging a seeded database

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::storage::KnowledgeDbStats;
use crate::types::{KnowledgeEdge, KnowledgePair};

#[derive(Debug, Serialize)]
pub struct PairsResponse {
    pub stats: KnowledgeDbStats,
    pub pairs: Vec<KnowledgePair>,
    pub edges: Vec<KnowledgeEdge>,
}

/// GET /api/pairs - List every stored pair and edge
pub async fn list_pairs(State(state): State<AppState>) -> Result<Json<PairsResponse>> {
    let db = state.db();

    Ok(Json(PairsResponse {
        stats: db.stats()?,
        pairs: db.list_knowledge_pairs()?,
        edges: db.list_edges()?,
    }))
}
