
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// Where a document came from. The core receives already-extracted plain
/// text either way; the source kind only drives duplicate detection and
/// display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    File,
    Url,
}

impl std::fmt::Display for DocumentSource {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentSource::File => write!(f, "file"),
            DocumentSource::Url => write!(f, "url"),
        }
    }
}

/// Document lifecycle. `pending -> processing -> indexed | failed`;
/// a failed document goes back to pending only via delete + recreate, and
/// an indexed document leaves the terminal state only through an explicit
/// reindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Indexed,
    Failed,
}

impl DocumentStatus {
    /// Whether the lifecycle permits moving to `next` from this state.
    #[inline]
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus as S;
        matches!(
            (self, next),
            (S::Pending, S::Processing)
                | (S::Pending, S::Failed)
                | (S::Processing, S::Indexed)
                | (S::Processing, S::Failed)
                | (S::Indexed, S::Pending)
                | (S::Failed, S::Pending)
        )
    }
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Indexed => write!(f, "indexed"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A stored document. Owned by the ingestion pipeline; the query path only
/// reads it for display enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub source: DocumentSource,
    pub url: Option<String>,
    pub size: i64,
    pub status: DocumentStatus,
    pub chunk_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a document row. The extracted source text travels
/// with it so reindexing can re-run the pipeline without the caller
/// resupplying content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub id: String,
    pub title: String,
    pub source: DocumentSource,
    pub url: Option<String>,
    pub content: String,
    pub size: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// A raw nearest-neighbor hit from the store, before display enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub page: Option<u32>,
    pub similarity: f32,
}
