//! In-memory backend for pipeline tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::backend::{
    Backend, BackendResult, CollectionHandle, ExistingDocument, ExtractionCounts, GraphStats,
    UploadMetadata,
};
use crate::error::BackendError;

#[derive(Default)]
pub struct MockBackend {
    collections: Mutex<HashMap<String, CollectionHandle>>,
    /// (collection id, document name, document id)
    documents: Mutex<Vec<(Uuid, String, Uuid)>>,
    upload_failures: Mutex<HashMap<String, BackendError>>,
    extraction_failures: Mutex<HashMap<String, BackendError>>,
    counts: Mutex<HashMap<String, ExtractionCounts>>,
    graph_failure: Mutex<Option<BackendError>>,
    unreachable: bool,
    race_on_create: bool,
    create_failures: AtomicUsize,
    lookup_failures_after_create: AtomicUsize,
    upload_delay: Option<Duration>,
    pub uploads: AtomicUsize,
    pub extractions: AtomicUsize,
    pub graph_builds: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub creates: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub extracted_names: Mutex<HashSet<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Creating a collection reports "already exists" while another client wins the race
    pub fn racing_create() -> Self {
        Self {
            race_on_create: true,
            ..Self::default()
        }
    }

    /// The first `n` create calls fail with a server error
    pub fn failing_create(n: usize) -> Self {
        let mock = Self::default();
        mock.create_failures.store(n, Ordering::SeqCst);
        mock
    }

    /// Once a create has been attempted, the next `n` lookups fail with a server error
    pub fn with_failing_lookups_after_create(self, n: usize) -> Self {
        self.lookup_failures_after_create.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn fail_upload(&self, name: &str, err: BackendError) {
        self.upload_failures.lock().unwrap().insert(name.to_string(), err);
    }

    pub fn fail_extraction(&self, name: &str, err: BackendError) {
        self.extraction_failures.lock().unwrap().insert(name.to_string(), err);
    }

    pub fn fail_graph(&self, err: BackendError) {
        *self.graph_failure.lock().unwrap() = Some(err);
    }

    pub fn set_counts(&self, name: &str, entities: usize, relationships: usize) {
        self.counts.lock().unwrap().insert(
            name.to_string(),
            ExtractionCounts {
                entity_count: entities,
                relationship_count: relationships,
            },
        );
    }

    /// Pre-create a collection holding the named documents
    pub fn seed(&self, collection: &str, names: &[&str]) -> CollectionHandle {
        let handle = self
            .collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_insert_with(|| CollectionHandle {
                id: Uuid::new_v4(),
                name: collection.to_string(),
            })
            .clone();
        let mut docs = self.documents.lock().unwrap();
        for name in names {
            docs.push((handle.id, name.to_string(), Uuid::new_v4()));
        }
        handle
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    fn name_of(&self, document_id: Uuid) -> Option<String> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .find(|(_, _, id)| *id == document_id)
            .map(|(_, name, _)| name.clone())
    }

    fn check_reachable(&self) -> BackendResult<()> {
        if self.unreachable {
            return Err(BackendError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn find_collection(&self, name: &str) -> BackendResult<Option<CollectionHandle>> {
        self.check_reachable()?;
        if self.creates.load(Ordering::SeqCst) > 0 {
            let remaining = self.lookup_failures_after_create.load(Ordering::SeqCst);
            if remaining > 0 {
                self.lookup_failures_after_create.store(remaining - 1, Ordering::SeqCst);
                return Err(BackendError::Failed("502 Bad Gateway".to_string()));
            }
        }
        Ok(self.collections.lock().unwrap().get(name).cloned())
    }

    async fn create_collection(&self, name: &str) -> BackendResult<CollectionHandle> {
        self.check_reachable()?;
        self.creates.fetch_add(1, Ordering::SeqCst);

        let remaining = self.create_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.create_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BackendError::Failed("503 Service Unavailable".to_string()));
        }

        let mut collections = self.collections.lock().unwrap();
        if self.race_on_create {
            collections.insert(
                name.to_string(),
                CollectionHandle {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                },
            );
            return Err(BackendError::AlreadyExists(format!("collection {}", name)));
        }
        if collections.contains_key(name) {
            return Err(BackendError::AlreadyExists(format!("collection {}", name)));
        }
        let handle = CollectionHandle {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        collections.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    async fn list_documents(&self, collection: &CollectionHandle) -> BackendResult<Vec<ExistingDocument>> {
        self.check_reachable()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|(col, _, _)| *col == collection.id)
            .map(|(_, name, id)| ExistingDocument {
                name: name.clone(),
                document_id: *id,
            })
            .collect())
    }

    async fn upload_document(
        &self,
        collection: &CollectionHandle,
        file_name: &str,
        _bytes: Vec<u8>,
        metadata: &UploadMetadata,
    ) -> BackendResult<Uuid> {
        assert_eq!(metadata.collection_id, collection.id.to_string());
        self.uploads.fetch_add(1, Ordering::SeqCst);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.upload_failures.lock().unwrap().get(file_name) {
            return Err(err.clone());
        }

        let mut docs = self.documents.lock().unwrap();
        if docs.iter().any(|(col, name, _)| *col == collection.id && name == file_name) {
            return Err(BackendError::AlreadyExists(format!("Document {} already exists", file_name)));
        }
        let id = Uuid::new_v4();
        docs.push((collection.id, file_name.to_string(), id));
        Ok(id)
    }

    async fn extract_entities(&self, document_id: Uuid) -> BackendResult<ExtractionCounts> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        let name = self
            .name_of(document_id)
            .ok_or_else(|| BackendError::Invalid(format!("unknown document {}", document_id)))?;
        self.extracted_names.lock().unwrap().insert(name.clone());

        if let Some(err) = self.extraction_failures.lock().unwrap().get(&name) {
            return Err(err.clone());
        }
        Ok(self.counts.lock().unwrap().get(&name).copied().unwrap_or_default())
    }

    async fn build_graph(&self, _collection: &CollectionHandle) -> BackendResult<()> {
        self.graph_builds.fetch_add(1, Ordering::SeqCst);
        match self.graph_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn graph_stats(&self, _collection: &CollectionHandle) -> BackendResult<GraphStats> {
        let counts = self.counts.lock().unwrap();
        Ok(GraphStats {
            entity_count: counts.values().map(|c| c.entity_count).sum(),
            relationship_count: counts.values().map(|c| c.relationship_count).sum(),
        })
    }
}
