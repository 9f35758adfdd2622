use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::chat::{ChatService, corpus_stats};
use crate::config::{Config, EmbeddingBackend, StoreBackend};
use crate::embeddings::{EmbeddingProvider, LocalEmbeddingProvider, RemoteEmbeddingProvider};
use crate::indexer::{Indexer, IngestReport, IngestRequest, SkipReason};
use crate::retrieval::Retriever;
use crate::store::{DocumentStatus, InMemoryVectorStore, SqliteVectorStore, VectorStore};
use crate::synthesis::{AnswerSynthesizer, GenerativeBackend, OllamaGenerator};

/// Fully wired service graph. Everything is constructed here, once, from
/// configuration and passed down explicitly; no module-level singletons.
pub struct Services {
    pub store: Arc<dyn VectorStore>,
    pub provider: Arc<dyn EmbeddingProvider>,
    pub indexer: Indexer,
    pub chat: ChatService,
}

/// Build the service graph for the configured backends.
#[inline]
pub async fn build_services(config: &Config) -> Result<Services> {
    let retry = config.retry.policy();

    let provider: Arc<dyn EmbeddingProvider> = match config.embedding.backend {
        EmbeddingBackend::Remote => Arc::new(
            RemoteEmbeddingProvider::new(&config.ollama, &config.embedding, retry.clone())
                .context("Failed to initialize remote embedding provider")?,
        ),
        EmbeddingBackend::Local => Arc::new(
            LocalEmbeddingProvider::new(config.embedding.dimension)
                .context("Failed to initialize local embedding provider")?,
        ),
    };

    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Sqlite => {
            let path = config.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }
            Arc::new(
                SqliteVectorStore::new(&path, config.embedding.dimension)
                    .await
                    .context("Failed to initialize sqlite vector store")?,
            )
        }
        StoreBackend::Memory => Arc::new(InMemoryVectorStore::new(config.embedding.dimension)),
    };

    let generator: Option<Arc<dyn GenerativeBackend>> = if config.generation.enabled {
        Some(Arc::new(
            OllamaGenerator::new(&config.ollama, &config.generation, retry)
                .context("Failed to initialize generative backend")?,
        ))
    } else {
        None
    };

    let retriever = Retriever::new(Arc::clone(&provider), Arc::clone(&store));
    let chat = ChatService::new(
        retriever,
        AnswerSynthesizer::new(generator),
        config.retrieval.clone(),
    );
    let indexer = Indexer::new(
        Arc::clone(&provider),
        Arc::clone(&store),
        config.chunking.clone(),
    );

    Ok(Services {
        store,
        provider,
        indexer,
        chat,
    })
}

/// Ingest local plain-text files.
#[inline]
pub async fn ingest_files(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let services = build_services(config).await?;

    let mut requests = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let size = std::fs::metadata(path)
            .map(|m| m.len() as i64)
            .unwrap_or(content.len() as i64);
        let title = file_title(path);

        let mut request = IngestRequest::file(&title, &content);
        request.size = Some(size);
        requests.push(request);
    }

    let bar = ProgressBar::new(requests.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut failures = 0;
    for request in requests {
        let title = request.title.clone();
        bar.set_message(title.clone());
        let report = services.indexer.ingest(request).await?;
        if report.status == DocumentStatus::Failed {
            failures += 1;
        }
        bar.println(describe_report(&title, &report));
        bar.inc(1);
    }
    bar.finish_and_clear();

    if failures > 0 {
        println!("{}", style(format!("{} file(s) failed", failures)).red());
    }
    Ok(())
}

/// Ingest a crawled page: the URL plus its already-extracted text.
#[inline]
pub async fn ingest_url(
    config: &Config,
    url: &str,
    extracted_text: &Path,
    title: Option<String>,
) -> Result<()> {
    let services = build_services(config).await?;

    let content = std::fs::read_to_string(extracted_text).with_context(|| {
        format!(
            "Failed to read extracted text: {}",
            extracted_text.display()
        )
    })?;
    let title = title.unwrap_or_else(|| url.to_string());

    let report = services
        .indexer
        .ingest(IngestRequest::url(&title, url, &content))
        .await?;
    println!("{}", describe_report(&title, &report));
    Ok(())
}

/// Ask a question against the indexed corpus.
#[inline]
pub async fn ask(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    similarity_floor: Option<f32>,
) -> Result<()> {
    let services = build_services(config).await?;

    let response = services.chat.answer(query, top_k, similarity_floor).await;

    println!("{}", response.answer);
    println!();
    println!(
        "{}",
        style(format!(
            "confidence {:.2} · model {} · {}ms",
            response.confidence, response.model, response.processing_time_ms
        ))
        .dim()
    );

    if !response.sources.is_empty() {
        println!();
        println!("{}", style("출처:").bold());
        for (i, source) in response.sources.iter().enumerate() {
            let location = source
                .document_url
                .clone()
                .unwrap_or_else(|| source.document_id.clone());
            println!(
                "  {}. {} ({:.3}) - {}",
                i + 1,
                source.document_title,
                source.similarity,
                location
            );
        }
    }
    Ok(())
}

/// List all documents with their lifecycle status.
#[inline]
pub async fn list_documents(config: &Config) -> Result<()> {
    let services = build_services(config).await?;
    let documents = services.store.list_documents().await?;

    if documents.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'docqa ingest <file>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    for doc in &documents {
        println!(
            "  {} [{}] {} - {} chunks, {} bytes, updated {}",
            doc.id,
            doc.status,
            doc.title,
            doc.chunk_count,
            doc.size,
            doc.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Delete a document and its chunks.
#[inline]
pub async fn delete_document(config: &Config, document_id: &str) -> Result<()> {
    let services = build_services(config).await?;

    if services.store.delete_document(document_id).await? {
        info!("deleted document {}", document_id);
        println!("Deleted {}", document_id);
    } else {
        println!("No document with id {}", document_id);
    }
    Ok(())
}

/// Re-run ingestion for a stored document.
#[inline]
pub async fn reindex_document(config: &Config, document_id: &str) -> Result<()> {
    let services = build_services(config).await?;

    let report = services.indexer.reindex(document_id).await?;
    println!("{}", describe_report(document_id, &report));
    Ok(())
}

/// Show corpus counters and backend reachability.
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let services = build_services(config).await?;

    let stats = corpus_stats(services.store.as_ref()).await?;
    println!("Documents: {}", stats.documents);
    println!("Chunks: {}", stats.chunks);
    println!(
        "Embedding backend: {} ({} dimensions)",
        services.provider.model_name(),
        services.provider.dimension()
    );

    if config.embedding.backend == EmbeddingBackend::Remote {
        let retry = config.retry.policy();
        let remote = RemoteEmbeddingProvider::new(&config.ollama, &config.embedding, retry)?;
        match tokio::task::spawn_blocking(move || remote.ping()).await? {
            Ok(()) => println!("Embedding server: {}", style("reachable").green()),
            Err(e) => println!("Embedding server: {} ({})", style("unreachable").red(), e),
        }
    }

    if config.generation.enabled {
        let retry = config.retry.policy();
        let generator = OllamaGenerator::new(&config.ollama, &config.generation, retry)?;
        let healthy = tokio::task::spawn_blocking(move || generator.health_check()).await?;
        if healthy {
            println!("Generative backend: {}", style("reachable").green());
        } else {
            println!(
                "Generative backend: {} (answers will be extractive)",
                style("unreachable").yellow()
            );
        }
    } else {
        println!("Generative backend: disabled");
    }
    Ok(())
}

fn file_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn describe_report(title: &str, report: &IngestReport) -> String {
    match (report.skipped, report.status) {
        (Some(SkipReason::AlreadyIndexed), _) => format!(
            "{} {} - already indexed ({} chunks)",
            style("skip").yellow(),
            title,
            report.chunks_processed
        ),
        (Some(SkipReason::InProgress), _) => {
            format!("{} {} - indexing in progress", style("skip").yellow(), title)
        }
        (None, DocumentStatus::Failed) => format!(
            "{} {} - {}",
            style("fail").red(),
            title,
            report.error.as_deref().unwrap_or("unknown error")
        ),
        (None, _) => format!(
            "{} {} - {} chunks in {}ms{}",
            style("ok").green(),
            title,
            report.chunks_processed,
            report.processing_time_ms,
            if report.degraded_embeddings > 0 {
                format!(" ({} degraded)", report.degraded_embeddings)
            } else {
                String::new()
            }
        ),
    }
}
