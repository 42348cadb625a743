//! Search endpoint: retrieval-augmented answer with gated citations

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::server::state::AppState;
use crate::types::{SearchRequest, SearchResponse, Source};

/// POST /api/search - Answer the latest chat message from the knowledge base
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    let query = request
        .latest_query()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| Error::BadRequest("No user message provided".to_string()))?;

    tracing::info!("Search: \"{}\"", query);

    let query_embedding = state.embedder().embed(query).await?;

    let mut matches = state
        .vector_index()
        .query(&query_embedding, state.config().retrieval.top_k)
        .await?;
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));

    let ids: Vec<String> = matches.into_iter().map(|m| m.id).collect();
    let pairs = state.db().find_knowledge_pairs(&ids)?;
    if pairs.len() < ids.len() {
        tracing::warn!(
            "{} matched ids have no stored knowledge pair",
            ids.len() - pairs.len()
        );
    }

    let context = PromptBuilder::format_context(&pairs);
    let prompt = PromptBuilder::synthesis_prompt(&context, query);
    let text = state.llm().generate(&prompt).await?;

    let classification = state.gate().classify(query, &text);
    tracing::debug!(
        is_question = classification.is_question,
        is_substantive_answer = classification.is_substantive_answer,
        "classified turn"
    );

    let sources = classification.gate(pairs.iter().map(Source::from).collect());

    tracing::info!(
        "Answered with {} of {} sources in {}ms",
        sources.len(),
        pairs.len(),
        start.elapsed().as_millis()
    );

    Ok(Json(SearchResponse { text, sources }))
}
