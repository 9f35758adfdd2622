use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocqaError>;

#[derive(Error, Debug)]
pub enum DocqaError {
    #[error("Empty input after preprocessing")]
    EmptyInput,

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Duplicate document: {0}")]
    DuplicateDocument(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod chunker;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod retrieval;
pub mod retry;
pub mod store;
pub mod synthesis;
