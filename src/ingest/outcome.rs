//! Per-file results recorded by the workers.
//!
//! A [`PipelineOutcome`] is only built through its constructors, so an
//! extraction result exists exactly when the upload outcome is `Uploaded`.

use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::backend::ExtractionCounts;
use crate::ingest::FileTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded,
    /// Backend already had a document with this name
    SkippedDuplicate,
    Failed,
    /// Never started: the run was cancelled or hit its deadline
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub task: FileTask,
    pub document_id: Option<Uuid>,
    pub outcome: UploadOutcome,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Extracted,
    Failed,
    /// Extraction disabled for this run
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub document_id: Uuid,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub outcome: ExtractionOutcome,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn extracted(document_id: Uuid, counts: ExtractionCounts) -> Self {
        Self {
            document_id,
            entity_count: counts.entity_count,
            relationship_count: counts.relationship_count,
            outcome: ExtractionOutcome::Extracted,
            error: None,
        }
    }

    pub fn failed(document_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            document_id,
            entity_count: 0,
            relationship_count: 0,
            outcome: ExtractionOutcome::Failed,
            error: Some(error.into()),
        }
    }

    pub fn skipped(document_id: Uuid) -> Self {
        Self {
            document_id,
            entity_count: 0,
            relationship_count: 0,
            outcome: ExtractionOutcome::Skipped,
            error: None,
        }
    }
}

/// Complete record for one queued file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub path: PathBuf,
    pub upload: UploadResult,
    pub extraction: Option<ExtractionResult>,
}

impl PipelineOutcome {
    pub fn uploaded(task: FileTask, document_id: Uuid, extraction: ExtractionResult) -> Self {
        Self {
            path: task.absolute_path.clone(),
            upload: UploadResult {
                task,
                document_id: Some(document_id),
                outcome: UploadOutcome::Uploaded,
                error: None,
            },
            extraction: Some(extraction),
        }
    }

    pub fn duplicate(task: FileTask) -> Self {
        Self::without_extraction(task, UploadOutcome::SkippedDuplicate, None)
    }

    pub fn upload_failed(task: FileTask, error: impl Into<String>) -> Self {
        Self::without_extraction(task, UploadOutcome::Failed, Some(error.into()))
    }

    pub fn cancelled(task: FileTask) -> Self {
        Self::without_extraction(task, UploadOutcome::Cancelled, None)
    }

    fn without_extraction(task: FileTask, outcome: UploadOutcome, error: Option<String>) -> Self {
        Self {
            path: task.absolute_path.clone(),
            upload: UploadResult {
                task,
                document_id: None,
                outcome,
                error,
            },
            extraction: None,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.upload.task.file_name
    }
}
