use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_rag_core::{
    ingest_folder_best_effort, number_citations, AnswerSynthesizer, EmbeddingGateway,
    EmbeddingProvider, GatewayConfig, HashEmbedder, IndexSchema, IngestionOptions,
    OpenAiChatClient, OpenAiEmbeddingClient, OpenSearchIndex, QueryOptions, QueryPipeline,
    ScoreReranker, SearchIndex, SynthesizerConfig,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Search index base URL
    #[arg(long, default_value = "http://localhost:9200")]
    index_url: String,

    /// Search index name
    #[arg(long, default_value = "pdf_rag_chunks")]
    index_name: String,

    /// Embedding endpoint base URL (OpenAI-compatible)
    #[arg(long, default_value = "https://api.openai.com/v1")]
    embeddings_url: String,

    /// Embedding model name
    #[arg(long, default_value = "text-embedding-3-large")]
    embeddings_model: String,

    /// Embedding vector dimension
    #[arg(long, default_value = "3072")]
    embedding_dimensions: usize,

    /// Chat endpoint base URL (OpenAI-compatible)
    #[arg(long, default_value = "https://api.openai.com/v1")]
    llm_url: String,

    /// Chat model name
    #[arg(long, default_value = "gpt-4o")]
    llm_model: String,

    /// API key for the model provider
    #[arg(long, env = "MODEL_API_KEY", default_value = "")]
    api_key: String,

    /// Use the deterministic local embedder instead of the HTTP provider
    #[arg(long, default_value_t = false)]
    local_embeddings: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a folder of PDFs: extract, chunk, embed, index.
    Ingest {
        /// Folder searched recursively for PDFs.
        #[arg(long)]
        folder: String,

        /// Chunk budget in estimated tokens.
        #[arg(long, default_value = "800")]
        chunk_size: usize,

        /// Overlap seed in words.
        #[arg(long, default_value = "50")]
        overlap: usize,
    },
    /// Ask a question over the indexed documents.
    Query {
        /// Natural-language question.
        #[arg(long)]
        question: String,

        /// Chunks handed to the answer generator.
        #[arg(long, default_value = "5")]
        max_chunks: usize,

        /// Restrict retrieval to these document ids (repeatable).
        #[arg(long)]
        document_id: Vec<String>,
    },
    /// Remove every indexed chunk of one document.
    Delete {
        #[arg(long)]
        document_id: String,
    },
    /// Drop and recreate the index with the current schema. Destructive.
    RecreateIndex,
}

fn embedding_provider(cli: &Cli) -> Arc<dyn EmbeddingProvider> {
    if cli.local_embeddings {
        Arc::new(HashEmbedder::default())
    } else {
        Arc::new(OpenAiEmbeddingClient::new(
            &cli.embeddings_url,
            &cli.api_key,
            &cli.embeddings_model,
            cli.embedding_dimensions,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let provider = embedding_provider(&cli);
    let gateway = EmbeddingGateway::new(Arc::clone(&provider), GatewayConfig::default());
    let schema = IndexSchema::chunk_schema(provider.dimensions());
    let index = OpenSearchIndex::new(&cli.index_url, &cli.index_name, schema);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    match &cli.command {
        Command::Ingest {
            folder,
            chunk_size,
            overlap,
        } => {
            let options = IngestionOptions {
                chunk_size: *chunk_size,
                overlap: *overlap,
            };
            // Fails fast on a bad chunk_size/overlap pair before any work.
            options
                .chunking_config()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            index
                .ensure_index()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let report =
                ingest_folder_best_effort(Path::new(folder), &options, &gateway, &index)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }

            let total_chunks: usize = report
                .ingested
                .iter()
                .map(|document| document.chunk_count)
                .sum();

            for document in &report.ingested {
                println!(
                    "{}: {} chunks (document_id={})",
                    document.fingerprint.document_title,
                    document.chunk_count,
                    document.fingerprint.document_id
                );
            }
            println!(
                "{} documents, {} chunks indexed at {}",
                report.ingested.len(),
                total_chunks,
                Utc::now().to_rfc3339()
            );
        }
        Command::Query {
            question,
            max_chunks,
            document_id,
        } => {
            let chat = OpenAiChatClient::new(&cli.llm_url, &cli.api_key, &cli.llm_model)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let synthesizer = AnswerSynthesizer::new(chat, SynthesizerConfig::default());
            let pipeline = QueryPipeline::new(index, gateway, synthesizer, ScoreReranker);

            let options = QueryOptions {
                max_chunks: *max_chunks,
                document_ids: document_id.clone(),
            };
            let response = pipeline
                .answer(question, &options)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("{}", response.answer.text);
            println!();
            println!(
                "confidence={:.2} found_in_documents={} elapsed_ms={}",
                response.answer.confidence_score,
                response.answer.found_in_documents,
                response.elapsed_ms
            );

            if !response.answer.citations.is_empty() {
                println!("sources:");
                for line in number_citations(&response.answer.citations) {
                    println!("  {line}");
                }
            }
        }
        Command::Delete { document_id } => {
            index
                .delete_document(document_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("deleted indexed chunks for document_id={document_id}");
        }
        Command::RecreateIndex => {
            index
                .recreate_index()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("index {} recreated", cli.index_name);
        }
    }

    Ok(())
}
