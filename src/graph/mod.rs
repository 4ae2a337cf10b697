//! Knowledge graph build over a whole collection.
//!
//! Runs once, after the worker pool has fully drained. A failed build is
//! reported in the summary but never changes file-level outcomes.

use serde::Serialize;

use crate::backend::{Backend, CollectionHandle, GraphStats};

/// How the graph build step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GraphBuildStatus {
    /// Build accepted; `stats` is absent if the graph could not be counted
    Built { stats: Option<GraphStats> },
    Failed { error: String },
    Skipped { reason: String },
}

impl GraphBuildStatus {
    pub fn skipped(reason: impl Into<String>) -> Self {
        GraphBuildStatus::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GraphBuildStatus::Built { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            GraphBuildStatus::Built { .. } => "created",
            GraphBuildStatus::Failed { .. } => "failed",
            GraphBuildStatus::Skipped { .. } => "skipped",
        }
    }
}

/// Trigger the collection graph build and count what it contains.
pub async fn build_collection_graph(backend: &dyn Backend, collection: &CollectionHandle) -> GraphBuildStatus {
    log::info!("🕸️  Creating knowledge graph for collection '{}'...", collection.name);

    if let Err(e) = backend.build_graph(collection).await {
        log::error!("✗ Error creating knowledge graph: {}", e);
        return GraphBuildStatus::Failed { error: e.to_string() };
    }

    let stats = match backend.graph_stats(collection).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            log::warn!("Could not count graph entities/relationships: {}", e);
            None
        }
    };

    match stats {
        Some(s) if s.entity_count > 0 || s.relationship_count > 0 => {
            log::info!("✓ Knowledge graph created successfully");
            log::info!(
                "📊 Graph contains {} entities and {} relationships",
                s.entity_count,
                s.relationship_count
            );
        }
        _ => log::info!(
            "✓ Knowledge graph build requested for '{}' (entities and relationships appear once extraction completes)",
            collection.name
        ),
    }

    GraphBuildStatus::Built { stats }
}
