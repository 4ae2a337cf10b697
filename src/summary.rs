//! End-of-run summary: a pure fold over the recorded outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::graph::GraphBuildStatus;
use crate::ingest::{ExtractionOutcome, PipelineOutcome, UploadOutcome};

/// Order-independent counters over all outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub uploaded: usize,
    /// "Already exists" answers received during upload
    pub skipped_duplicates: usize,
    pub upload_failed: usize,
    pub cancelled: usize,
    pub extracted: usize,
    pub extraction_failed: usize,
    pub extraction_skipped: usize,
    pub entities: usize,
    pub relationships: usize,
}

impl OutcomeCounts {
    pub fn fold(outcomes: &[PipelineOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), Self::add)
    }

    fn add(mut self, outcome: &PipelineOutcome) -> Self {
        match outcome.upload.outcome {
            UploadOutcome::Uploaded => self.uploaded += 1,
            UploadOutcome::SkippedDuplicate => self.skipped_duplicates += 1,
            UploadOutcome::Failed => self.upload_failed += 1,
            UploadOutcome::Cancelled => self.cancelled += 1,
        }
        if let Some(extraction) = &outcome.extraction {
            match extraction.outcome {
                ExtractionOutcome::Extracted => self.extracted += 1,
                ExtractionOutcome::Failed => self.extraction_failed += 1,
                ExtractionOutcome::Skipped => self.extraction_skipped += 1,
            }
            self.entities += extraction.entity_count;
            self.relationships += extraction.relationship_count;
        }
        self
    }
}

/// One failed file, for the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub stage: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub collection: String,
    /// Files found by discovery
    pub discovered: usize,
    /// Files left out because the collection already had them
    pub excluded_duplicates: usize,
    #[serde(flatten)]
    pub counts: OutcomeCounts,
    pub graph: GraphBuildStatus,
    pub failures: Vec<FileFailure>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl RunSummary {
    pub fn new(
        collection: &str,
        discovered: usize,
        excluded_duplicates: usize,
        outcomes: &[PipelineOutcome],
        graph: GraphBuildStatus,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let mut failures: Vec<FileFailure> = outcomes.iter().filter_map(failure_of).collect();
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            collection: collection.to_string(),
            discovered,
            excluded_duplicates,
            counts: OutcomeCounts::fold(outcomes),
            graph,
            failures,
            started_at,
            duration_secs: duration.as_secs_f64(),
        }
    }

    /// Files that went through the queue
    pub fn processed(&self) -> usize {
        let c = &self.counts;
        c.uploaded + c.skipped_duplicates + c.upload_failed + c.cancelled
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn failure_of(outcome: &PipelineOutcome) -> Option<FileFailure> {
    let path = outcome.upload.task.relative_path.clone();
    if outcome.upload.outcome == UploadOutcome::Failed {
        return Some(FileFailure {
            path,
            stage: "upload",
            error: outcome.upload.error.clone().unwrap_or_default(),
        });
    }
    outcome
        .extraction
        .as_ref()
        .filter(|e| e.outcome == ExtractionOutcome::Failed)
        .map(|e| FileFailure {
            path,
            stage: "extraction",
            error: e.error.clone().unwrap_or_default(),
        })
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counts;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "🎉 Ingestion finished for collection '{}'", self.collection)?;
        writeln!(f, "⏱️  Total time: {:.2} seconds", self.duration_secs)?;
        writeln!(f, "📄 Files discovered: {}", self.discovered)?;
        writeln!(f, "⏭️  Already in collection: {}", self.excluded_duplicates)?;
        writeln!(f, "📤 Successfully uploaded: {}", c.uploaded)?;
        writeln!(f, "⏭️  Skipped duplicates: {}", c.skipped_duplicates)?;
        writeln!(f, "✗ Failed uploads: {}", c.upload_failed)?;
        if c.cancelled > 0 {
            writeln!(f, "🚫 Cancelled before start: {}", c.cancelled)?;
        }
        writeln!(f, "🔍 Successful extractions: {}", c.extracted)?;
        writeln!(f, "✗ Failed extractions: {}", c.extraction_failed)?;
        if c.extraction_skipped > 0 {
            writeln!(f, "⏭️  Extraction skipped: {}", c.extraction_skipped)?;
        }
        writeln!(f, "📊 Total entities: {}", c.entities)?;
        writeln!(f, "🔗 Total relationships: {}", c.relationships)?;

        match &self.graph {
            GraphBuildStatus::Built { stats: Some(stats) } => writeln!(
                f,
                "🕸️  Knowledge graph: created ({} entities, {} relationships)",
                stats.entity_count, stats.relationship_count
            )?,
            GraphBuildStatus::Built { stats: None } => writeln!(f, "🕸️  Knowledge graph: created")?,
            GraphBuildStatus::Failed { error } => writeln!(f, "🕸️  Knowledge graph: failed ({})", error)?,
            GraphBuildStatus::Skipped { reason } => writeln!(f, "🕸️  Knowledge graph: skipped ({})", reason)?,
        }

        if !self.failures.is_empty() {
            writeln!(f, "Failures:")?;
            for failure in &self.failures {
                writeln!(f, "  ✗ {} [{}]: {}", failure.path, failure.stage, failure.error)?;
            }
        }
        write!(f, "{}", "=".repeat(60))
    }
}
