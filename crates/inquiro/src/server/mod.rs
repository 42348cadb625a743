//! HTTP server for Inquiro

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::InquiroConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Inquiro HTTP server
pub struct InquiroServer {
    config: InquiroConfig,
    state: AppState,
}

impl InquiroServer {
    /// Create a server backed by the hosted providers
    pub fn new(config: InquiroConfig) -> Result<Self> {
        let state = AppState::from_config(config.clone())?;
        Ok(Self { config, state })
    }

    /// Create a server around prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.server.enable_cors)
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        tracing::info!("Starting Inquiro server on http://{}", addr);
        tracing::info!("API info: http://{}/api/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

fn build_router(state: AppState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .nest("/api", routes::api_routes())
        .with_state(state)
        // Applied bottom to top
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint: health-checks the hosted providers
async fn readiness(state: axum::extract::State<AppState>) -> axum::http::StatusCode {
    if state.check_readiness().await {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::VectorMatch;
    use crate::storage::KnowledgeDb;
    use crate::test_support::{FakeEmbedder, FakeIndex, FakeLlm};
    use crate::types::{KnowledgePair, SearchResponse};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Fixture {
        db: KnowledgeDb,
        deduction: KnowledgePair,
        records: KnowledgePair,
    }

    fn fixture() -> Fixture {
        let db = KnowledgeDb::in_memory().unwrap();
        let users = db
            .insert_users(["owner@cafe.com", "cpa@example.com"])
            .unwrap();
        let thread = db.insert_thread("Espresso <machine> & taxes").unwrap();
        let sent = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        db.insert_message(
            &thread.id,
            &users["owner@cafe.com"],
            "msg_3",
            "Is our espresso machine deductible?",
            sent,
        )
        .unwrap();
        let reply = db
            .insert_message(
                &thread.id,
                &users["cpa@example.com"],
                "msg_4",
                "Yes. <b>Keep</b> the receipt.",
                sent + chrono::Duration::hours(2),
            )
            .unwrap();

        let deduction = db
            .insert_knowledge_pair(
                "Is an office espresso machine deductible?",
                "Yes, keep the receipt.",
            )
            .unwrap();
        let records = db
            .insert_knowledge_pair("What records do I need?", "Receipts and invoices.")
            .unwrap();
        db.link_source_message(&deduction.id, &reply).unwrap();

        Fixture {
            db,
            deduction,
            records,
        }
    }

    fn app(fx: &Fixture, llm: FakeLlm) -> (Router, Arc<FakeLlm>) {
        let (router, llm, _) = app_with_state(fx, llm);
        (router, llm)
    }

    fn app_with_state(fx: &Fixture, llm: FakeLlm) -> (Router, Arc<FakeLlm>, AppState) {
        // Lower score first to check that sources follow match order
        let index = FakeIndex::ready_with_matches(vec![
            VectorMatch {
                id: fx.records.id.clone(),
                score: 0.61,
            },
            VectorMatch {
                id: "stale-id".to_string(),
                score: 0.70,
            },
            VectorMatch {
                id: fx.deduction.id.clone(),
                score: 0.93,
            },
        ]);
        let llm = Arc::new(llm);

        let state = AppState::new(
            InquiroConfig::default(),
            fx.db.clone(),
            Arc::new(FakeEmbedder::new()),
            llm.clone(),
            Arc::new(index),
        )
        .unwrap();

        (InquiroServer::with_state(state.clone()).router(), llm, state)
    }

    fn search_request(messages: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "messages": messages }).to_string()))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_health() {
        let fx = fixture();
        let (router, _) = app(&fx, FakeLlm::replying("ok"));

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
    }

    #[tokio::test]
    async fn test_ready_checks_providers() {
        let fx = fixture();
        let (router, _, state) = app_with_state(&fx, FakeLlm::replying("ok"));
        assert!(!state.is_ready());

        let response = router
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.is_ready());

        let response = router
            .oneshot(Request::get("/api/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["ready"], true);
    }

    #[tokio::test]
    async fn test_not_ready_when_llm_is_down() {
        let fx = fixture();
        let llm = FakeLlm::new(|_| Err(crate::error::Error::Llm("down".to_string()))).unhealthy();
        let (router, _, state) = app_with_state(&fx, llm);

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_not_ready_when_index_is_missing() {
        let fx = fixture();
        let state = AppState::new(
            InquiroConfig::default(),
            fx.db.clone(),
            Arc::new(FakeEmbedder::new()),
            Arc::new(FakeLlm::replying("ok")),
            Arc::new(FakeIndex::missing()),
        )
        .unwrap();

        assert!(!state.check_readiness().await);
    }

    #[tokio::test]
    async fn test_trailing_assistant_turn_is_not_the_query() {
        let fx = fixture();
        let (router, llm) = app(&fx, FakeLlm::replying("Keep receipts and invoices."));

        let response = router
            .oneshot(search_request(json!([
                { "role": "user", "content": "What records do I need?" },
                { "role": "assistant", "content": "no thanks" }
            ])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: SearchResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.sources.len(), 2);

        let prompts = llm.prompts.lock();
        assert!(prompts[0].ends_with("USER'S QUESTION:\nWhat records do I need?"));
    }

    #[tokio::test]
    async fn test_assistant_only_conversation_is_bad_request() {
        let fx = fixture();
        let (router, llm) = app(&fx, FakeLlm::replying("unused"));

        let response = router
            .oneshot(search_request(json!([
                { "role": "assistant", "content": "Hi! How can I help?" }
            ])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(llm.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_question_with_answer_gets_sources_in_score_order() {
        let fx = fixture();
        let (router, llm) = app(&fx, FakeLlm::replying("Yes, an espresso machine is deductible."));

        let response = router
            .oneshot(search_request(json!([
                { "role": "user", "content": "hello" },
                { "role": "assistant", "content": "Hi! How can I help?" },
                { "role": "user", "content": "Is my espresso machine deductible?" }
            ])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: SearchResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();

        assert_eq!(body.text, "Yes, an espresso machine is deductible.");
        let ids: Vec<&str> = body.sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![fx.deduction.id.as_str(), fx.records.id.as_str()]);

        let prompts = llm.prompts.lock();
        assert!(prompts[0].contains("USER'S QUESTION:\nIs my espresso machine deductible?"));
        assert!(prompts[0].contains(
            "Question: Is an office espresso machine deductible?\nAnswer: Yes, keep the receipt.\n\n---\n\nQuestion: What records do I need?"
        ));
    }

    #[tokio::test]
    async fn test_closing_phrase_gets_no_sources() {
        let fx = fixture();
        let (router, _) = app(&fx, FakeLlm::replying("You're welcome. Goodbye!"));

        let response = router
            .oneshot(search_request(json!([{ "role": "user", "content": "thanks, that's all" }])))
            .await
            .unwrap();

        let body: SearchResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(body.sources.is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_information_reply_gets_no_sources() {
        let fx = fixture();
        let (router, _) = app(
            &fx,
            FakeLlm::replying("I'm sorry, I don't have enough information to answer that."),
        );

        let response = router
            .oneshot(search_request(json!([{ "content": "What is the capital gains rate?" }])))
            .await
            .unwrap();

        let body: SearchResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(body.sources.is_empty());
    }

    #[tokio::test]
    async fn test_empty_messages_is_bad_request() {
        let fx = fixture();
        let (router, llm) = app(&fx, FakeLlm::replying("unused"));

        let response = router.oneshot(search_request(json!([]))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"]["type"], "bad_request");
        assert!(llm.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_maps_to_service_unavailable() {
        let fx = fixture();
        let (router, _) = app(
            &fx,
            FakeLlm::new(|_| Err(crate::error::Error::Llm("quota exceeded".to_string()))),
        );

        let response = router
            .oneshot(search_request(json!([{ "content": "What records do I need?" }])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_source_page_escapes_content() {
        let fx = fixture();
        let (router, _) = app(&fx, FakeLlm::replying("unused"));

        let response = router
            .oneshot(
                Request::get(format!("/api/source/{}", fx.deduction.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(response).await).unwrap();

        assert!(html.contains("Thread: Espresso &lt;machine&gt; &amp; taxes"));
        assert!(html.contains("Yes. &lt;b&gt;Keep&lt;/b&gt; the receipt."));
        assert!(html.contains("<strong>From:</strong> owner@cafe.com"));
        assert!(html.contains("2024-03-05 09:30 UTC"));
        // Whole thread is shown, oldest first
        let first = html.find("msg_3").unwrap();
        let second = html.find("msg_4").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_unknown_source_is_not_found() {
        let fx = fixture();
        let (router, _) = app(&fx, FakeLlm::replying("unused"));

        let response = router
            .oneshot(Request::get("/api/source/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(response).await, b"Knowledge pair not found");
    }

    #[tokio::test]
    async fn test_list_pairs() {
        let fx = fixture();
        let (router, _) = app(&fx, FakeLlm::replying("unused"));

        let response = router
            .oneshot(Request::get("/api/pairs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["stats"]["knowledge_pairs"], 2);
        assert_eq!(body["pairs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_custom_phrase_table_from_config() {
        let fx = fixture();
        let table = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            table.path(),
            r#"
            [[rule]]
            phrase = "cheers"
            matching = "whole"
            effect = "not_question"
            "#,
        )
        .unwrap();

        let mut config = InquiroConfig::default();
        config.classifier.phrase_table = Some(table.path().to_path_buf());

        let state = AppState::new(
            config,
            fx.db.clone(),
            Arc::new(FakeEmbedder::new()),
            Arc::new(FakeLlm::replying("ok")),
            Arc::new(FakeIndex::ready_with_matches(Vec::new())),
        )
        .unwrap();

        assert!(!state.gate().is_question("Cheers"));
        // Built-in phrases are replaced, not extended
        assert!(state.gate().is_question("no thanks"));
    }
}
