//! Document backend contract and the R2R HTTP implementation.
//!
//! The pipeline only talks to the backend through [`Backend`], so the worker
//! pool can be driven against the real R2R service or an in-memory fake.

pub mod r2r;
pub mod responses;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::BackendError;

pub use r2r::R2rClient;

/// Result type for a single backend call
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A resolved collection; passed to every collection-scoped call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub id: Uuid,
    pub name: String,
}

/// A document already stored in a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingDocument {
    pub name: String,
    pub document_id: Uuid,
}

/// Metadata attached to every uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadMetadata {
    pub title: String,
    pub collection: String,
    pub collection_id: String,
    pub source_folder: String,
    pub file_size: u64,
    pub file_type: String,
}

/// Entities and relationships produced by extracting one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionCounts {
    pub entity_count: usize,
    pub relationship_count: usize,
}

/// Size of a collection's knowledge graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relationship_count: usize,
}

/// Remote document store the pipeline drives.
///
/// Implementations must be safe to share between workers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Look up a collection by exact name
    async fn find_collection(&self, name: &str) -> BackendResult<Option<CollectionHandle>>;

    /// Create a collection; `AlreadyExists` if the name is taken
    async fn create_collection(&self, name: &str) -> BackendResult<CollectionHandle>;

    /// Every document in the collection, across all pages
    async fn list_documents(&self, collection: &CollectionHandle) -> BackendResult<Vec<ExistingDocument>>;

    /// Upload one file into the collection and return its document id
    async fn upload_document(
        &self,
        collection: &CollectionHandle,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: &UploadMetadata,
    ) -> BackendResult<Uuid>;

    /// Run entity/relationship extraction for a document and wait for it to finish
    async fn extract_entities(&self, document_id: Uuid) -> BackendResult<ExtractionCounts>;

    /// Build the knowledge graph over the whole collection
    async fn build_graph(&self, collection: &CollectionHandle) -> BackendResult<()>;

    /// Entity and relationship totals of the collection graph
    async fn graph_stats(&self, collection: &CollectionHandle) -> BackendResult<GraphStats>;
}
