//! Inquiro server binary
//!
//! Run with: cargo run -p inquiro --bin inquiro-server [config.toml]

use inquiro::{config::InquiroConfig, server::InquiroServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inquiro=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                          Inquiro                          ║
║         Answers from your firm's email knowledge          ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = InquiroConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Synthesis model: {}", config.gemini.synthesis_model);
    tracing::info!("  - Embedding model: {}", config.gemini.embedding_model);
    tracing::info!("  - Vector index: {}", config.vector_index.index_name);
    tracing::info!("  - Database: {}", config.database.path.display());
    tracing::info!("  - Top k: {}", config.retrieval.top_k);

    let server = InquiroServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/search      - Ask a question");
    println!("  GET  /api/source/:id  - View source emails");
    println!("  GET  /api/pairs       - List stored knowledge");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
