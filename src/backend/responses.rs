//! Wire shapes returned by the R2R v3 API.
//!
//! Depending on server version and route, a payload may come wrapped in
//! `{"results": ...}` or bare, and ids may be named `id`, `document_id` or
//! `collection_id`. Each call gets a small untagged enum listing the shapes we
//! accept; anything else is reported as [`BackendError::UnrecognizedResponse`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::BackendResult;
use crate::error::BackendError;

/// Longest response excerpt kept in an error message
const MAX_BODY_EXCERPT: usize = 300;

/// A single object, wrapped or bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { results: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { results } => results,
            Envelope::Bare(inner) => inner,
        }
    }
}

/// A listing, paged with a total or a plain array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Paged {
        results: Vec<T>,
        #[serde(default)]
        total_entries: Option<usize>,
    },
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    pub fn total_entries(&self) -> Option<usize> {
        match self {
            Listing::Paged { total_entries, .. } => *total_entries,
            Listing::Plain(_) => None,
        }
    }

    /// A bare array carries no paging information and holds the whole listing
    pub fn is_complete(&self) -> bool {
        matches!(self, Listing::Plain(_))
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Paged { results, .. } => results,
            Listing::Plain(items) => items,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionRecord {
    #[serde(alias = "collection_id")]
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRecord {
    #[serde(alias = "document_id")]
    pub id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub extraction_status: Option<ExtractionStatus>,
}

impl DocumentRecord {
    /// Name used as the duplicate key: the title, else `metadata.title`
    pub fn name(&self) -> Option<String> {
        self.title
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.get("title"))
                    .and_then(|t| t.as_str())
                    .filter(|t| !t.is_empty())
                    .map(|t| t.to_string())
            })
    }
}

/// Per-document extraction state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Success,
    Enriched,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ExtractionStatus {
    pub fn is_done(self) -> bool {
        matches!(self, ExtractionStatus::Success | ExtractionStatus::Enriched)
    }
}

/// Acknowledgement of an accepted upload
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionAck {
    #[serde(alias = "id")]
    pub document_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

/// Acknowledgement of an accepted background task
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TaskAck {
    Flag { success: bool },
    Message { message: String },
}

impl TaskAck {
    pub fn succeeded(&self) -> bool {
        match self {
            TaskAck::Flag { success } => *success,
            TaskAck::Message { .. } => true,
        }
    }
}

/// Decode `body` as `T`, or report which endpoint sent what.
pub fn parse<T: DeserializeOwned>(endpoint: &str, body: &str) -> BackendResult<T> {
    serde_json::from_str(body).map_err(|e| {
        log::debug!("{} response did not match any known shape: {}", endpoint, e);
        BackendError::UnrecognizedResponse {
            endpoint: endpoint.to_string(),
            body: excerpt(body),
        }
    })
}

/// Truncate a response body for logging and error messages
pub fn excerpt(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX_BODY_EXCERPT).collect();
    format!("{}...", cut)
}
