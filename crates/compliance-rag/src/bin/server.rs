//! Compliance RAG server binary
//!
//! Run with: cargo run -p compliance-rag --bin compliance-rag-server
//!
//! Environment:
//! - `COMPLIANCE_RAG_CONFIG`: path to a TOML config file (defaults otherwise)
//! - `OPENROUTER_API_KEY`: API key for the generation backend

use std::sync::Arc;

use compliance_rag::{
    config::RagConfig,
    engine::RagEngine,
    ingestion::{IngestPipeline, TextChunker},
    providers::{EmbeddingProvider, OllamaEmbedder, OpenRouterLlm},
    server::{state::AppState, RagServer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compliance_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                    Compliance RAG Engine                  ║
║       Grounded Regulatory Answers with Chunk Citations    ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Load configuration
    let mut config = match std::env::var("COMPLIANCE_RAG_CONFIG") {
        Ok(path) => {
            tracing::info!("Loading configuration from {}", path);
            RagConfig::from_file(&path)?
        }
        Err(_) => RagConfig::default(),
    };
    if config.generation.api_key.is_none() {
        config.generation.api_key = std::env::var("OPENROUTER_API_KEY").ok();
    }
    if config.generation.api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY is not set; generation requests will be rejected");
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - Generation model: {}", config.generation.model);
    tracing::info!("  - Similarity threshold: {}", config.retrieval.similarity_threshold);
    tracing::info!("  - Data directory: {}", config.ingestion.data_dir.display());

    let embedder = Arc::new(OllamaEmbedder::new(&config.embeddings)?);
    if !embedder.health_check().await? {
        tracing::warn!("Ollama not available at {}", config.embeddings.base_url);
        tracing::warn!("  Start it with `ollama serve` and pull `{}`", config.embeddings.model);
    }
    let llm = Arc::new(OpenRouterLlm::new(&config.generation)?);

    let engine = Arc::new(RagEngine::new(&config, embedder, llm)?);
    let pipeline = Arc::new(IngestPipeline::new(
        Arc::clone(&engine),
        TextChunker::from_config(&config.chunking),
        config.ingestion.data_dir.clone(),
    ));

    if config.ingestion.scan_on_start {
        match pipeline.scan().await {
            Ok(report) => tracing::info!(
                "Initial scan: {} documents, {} chunks",
                report.documents_updated,
                report.chunks_inserted
            ),
            Err(e) => tracing::warn!("Initial scan skipped: {}", e),
        }
    }

    let server = RagServer::new(config.server.clone(), AppState::new(engine, pipeline));

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/answer     - Ask a compliance question");
    println!("  POST /api/retrieve   - Retrieve relevant passages");
    println!("  GET  /api/documents  - List documents");
    println!("  POST /api/ingest     - Rescan the data directory");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
