use std::sync::{Arc, Mutex, MutexGuard};

use crate::ingest::PipelineOutcome;

/// Append-only result set shared by all workers.
///
/// One lock guards the whole list; the critical section is a single push, so
/// network I/O never happens while it is held.
#[derive(Clone, Default)]
pub struct Aggregator {
    outcomes: Arc<Mutex<Vec<PipelineOutcome>>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: PipelineOutcome) {
        self.lock().push(outcome);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<PipelineOutcome> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PipelineOutcome>> {
        // A worker that panicked mid-push cannot leave the Vec half-written
        self.outcomes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{FileTask, MediaKind};
    use std::path::PathBuf;

    fn task(name: &str) -> FileTask {
        FileTask {
            absolute_path: PathBuf::from("/data").join(name),
            relative_path: name.to_string(),
            file_name: name.to_string(),
            extension: "txt".to_string(),
            media_kind: MediaKind::Text,
            size: 1,
        }
    }

    #[test]
    fn test_record_and_snapshot() {
        let aggregator = Aggregator::new();
        assert!(aggregator.is_empty());
        aggregator.record(PipelineOutcome::duplicate(task("a.txt")));
        aggregator.record(PipelineOutcome::upload_failed(task("b.txt"), "boom"));

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].file_name(), "a.txt");
        assert_eq!(snapshot[1].file_name(), "b.txt");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_are_not_lost() {
        let aggregator = Aggregator::new();
        let mut handles = Vec::new();
        for w in 0..8 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    aggregator.record(PipelineOutcome::duplicate(task(&format!("{}-{}.txt", w, i))));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(aggregator.len(), 400);
    }
}
