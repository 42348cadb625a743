//! Seed the knowledge base from an emails file, or inspect what is stored

use anyhow::Result;
use clap::{Parser, Subcommand};
use inquiro::{InquiroConfig, KnowledgeDb, Seeder};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "inquiro-seed")]
#[command(about = "Build the Inquiro knowledge base from email threads")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract knowledge and populate the database and vector index
    Run {
        /// Emails JSON file
        #[arg(long)]
        emails: Option<PathBuf>,

        /// Use built-in mock extractions instead of calling the model
        #[arg(long)]
        skip_api_calls: bool,

        /// Do not embed or upsert into the vector index
        #[arg(long)]
        skip_vector_index: bool,

        /// Number of threads to extract from
        #[arg(long)]
        max_threads: Option<usize>,
    },

    /// Print the stored knowledge pairs
    Inspect,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inquiro=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = InquiroConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            emails,
            skip_api_calls,
            skip_vector_index,
            max_threads,
        } => {
            if let Some(emails) = emails {
                config.seed.emails_path = emails;
            }
            if let Some(max_threads) = max_threads {
                config.seed.max_threads = max_threads;
            }
            config.seed.skip_api_calls |= skip_api_calls;
            config.seed.skip_vector_index |= skip_vector_index;

            let report = Seeder::from_config(&config)?.run().await?;

            println!("\nSeeding complete:");
            println!("  Threads read:      {}", report.threads_read);
            println!("  Threads stored:    {}", report.threads_stored);
            println!("  Messages stored:   {}", report.messages_stored);
            println!("  Knowledge pairs:   {}", report.pairs_stored);
            println!("  Edges:             {} ({} skipped)", report.edges_stored, report.edges_skipped);
            println!("  Vectors upserted:  {}", report.vectors_upserted);
            if report.embeddings_failed > 0 {
                println!("  Failed embeddings: {}", report.embeddings_failed);
            }
        }
        Commands::Inspect => {
            let db = KnowledgeDb::new(&config.database.path)?;
            let pairs = db.list_knowledge_pairs()?;

            println!("Found {} knowledge pairs:", pairs.len());
            for (i, pair) in pairs.iter().enumerate() {
                println!("\n{}. ID: {}", i + 1, pair.id);
                println!("   Question: {}", pair.question);
                println!("   Answer: {}", truncate(&pair.answer, 100));
            }

            let stats = db.stats()?;
            println!(
                "\n{} users, {} threads, {} messages, {} edges",
                stats.users, stats.threads, stats.messages, stats.edges
            );
        }
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
