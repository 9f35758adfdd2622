use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docqa::commands::{
    ask, delete_document, ingest_files, ingest_url, list_documents, reindex_document, show_status,
};
use docqa::config::Config;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Retrieval core for a document question-answering assistant")]
#[command(version)]
struct Cli {
    /// Data directory holding config.toml and the vector database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest plain-text files into the corpus
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ingest a crawled page from its URL and extracted text
    IngestUrl {
        /// Source URL (duplicate key for url documents)
        url: String,
        /// File containing the already-extracted page text
        text_file: PathBuf,
        /// Optional display title
        #[arg(long)]
        title: Option<String>,
    },
    /// Ask a question against the indexed corpus
    Ask {
        /// The question
        query: String,
        /// Number of sources to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum similarity for a source to count
        #[arg(long)]
        similarity_floor: Option<f32>,
    },
    /// List ingested documents
    List,
    /// Delete a document and its chunks
    Delete {
        /// Document id to delete
        document_id: String,
    },
    /// Re-run ingestion for a stored document
    Reindex {
        /// Document id to reindex
        document_id: String,
    },
    /// Show corpus counters and backend reachability
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(Config::default_dir);
    let config = Config::load(&data_dir)?;

    match cli.command {
        Commands::Ingest { paths } => {
            ingest_files(&config, &paths).await?;
        }
        Commands::IngestUrl {
            url,
            text_file,
            title,
        } => {
            ingest_url(&config, &url, &text_file, title).await?;
        }
        Commands::Ask {
            query,
            top_k,
            similarity_floor,
        } => {
            ask(&config, &query, top_k, similarity_floor).await?;
        }
        Commands::List => {
            list_documents(&config).await?;
        }
        Commands::Delete { document_id } => {
            delete_document(&config, &document_id).await?;
        }
        Commands::Reindex { document_id } => {
            reindex_document(&config, &document_id).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}
