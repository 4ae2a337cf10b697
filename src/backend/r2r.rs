use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use url::Url;
use uuid::Uuid;

use crate::backend::responses::{
    excerpt, parse, CollectionRecord, DocumentRecord, Envelope, ExtractionStatus, IngestionAck, Listing,
    TaskAck,
};
use crate::backend::{
    Backend, BackendResult, CollectionHandle, ExistingDocument, ExtractionCounts, GraphStats,
    UploadMetadata,
};
use crate::config::Config;
use crate::error::{BackendError, IngestError, Result};

/// Retries for idempotent reads (listings, status polls)
const READ_RETRIES: usize = 3;

/// Upper bound on pages fetched for one listing without a reported total
const MAX_LISTING_PAGES: usize = 10_000;

/// R2R v3 REST client
///
/// Shared by all workers: `reqwest::Client` pools connections and is safe for
/// concurrent use.
pub struct R2rClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    request_timeout: Duration,
    page_size: usize,
    poll_interval: Duration,
    extraction_timeout: Duration,
}

impl R2rClient {
    /// Create a client for the server at `base_url`
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server root, e.g. `http://localhost:7272` (a path prefix is kept)
    /// * `api_key` - Optional bearer token
    /// * `request_timeout` - Per-request timeout
    pub fn new(base_url: &str, api_key: Option<String>, request_timeout: Duration) -> Result<Self> {
        // Trailing slash so relative joins keep any path prefix
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| IngestError::Config(format!("Invalid backend URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            request_timeout,
            page_size: 100,
            poll_interval: Duration::from_secs(2),
            extraction_timeout: Duration::from_secs(600),
        })
    }

    /// Build a client from the `[backend]` and `[extraction]` sections
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(&config.backend.base_url, config.api_key(), config.request_timeout())?
            .with_page_size(config.backend.page_size)
            .with_polling(config.poll_interval(), config.extraction_timeout()))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Interval between extraction status polls and the overall wait limit
    pub fn with_polling(mut self, poll_interval: Duration, extraction_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.extraction_timeout = extraction_timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::Invalid(format!("bad endpoint {}: {}", path, e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Send a request and return the body of a 2xx response
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> BackendResult<String> {
        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Failed(format!("{}: failed to read response: {}", endpoint, e)))?;

        log::debug!("{} -> {} in {:?}", endpoint, status, start.elapsed());

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        Ok(body)
    }

    /// GET a JSON document, retrying transient failures with exponential backoff
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> BackendResult<T> {
        let url = self.url(path)?;
        let mut attempt = 0;
        let mut delay = Duration::from_millis(500);

        loop {
            let request = self.request(Method::GET, url.clone()).query(query);
            match self.send(path, request).await {
                Ok(body) => return parse(path, &body),
                Err(e) if attempt < READ_RETRIES && e.is_retryable() => {
                    log::warn!("Retry {}/{} for {} after error: {}", attempt + 1, READ_RETRIES, path, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// POST a JSON body (or nothing) and decode the response
    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: Option<&serde_json::Value>) -> BackendResult<T> {
        let url = self.url(path)?;
        let mut request = self.request(Method::POST, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let text = self.send(path, request).await?;
        parse(path, &text)
    }

    /// Fetch every page of a listing.
    ///
    /// A bare array is an unpaginated listing and is returned as-is.
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> BackendResult<Vec<T>> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        for _ in 0..MAX_LISTING_PAGES {
            let query = [("offset", offset.to_string()), ("limit", self.page_size.to_string())];
            let page: Listing<T> = self.get_json(path, &query).await?;
            if page.is_complete() {
                items.extend(page.into_items());
                return Ok(items);
            }

            let total = page.total_entries();
            let page_items = page.into_items();
            let fetched = page_items.len();
            items.extend(page_items);
            offset += fetched;

            let exhausted = match total {
                Some(total) => offset >= total,
                None => fetched < self.page_size,
            };
            if exhausted || fetched == 0 {
                return Ok(items);
            }
        }

        log::warn!("{}: stopped after {} pages ({} items)", path, MAX_LISTING_PAGES, items.len());
        Ok(items)
    }

    /// Number of items in a listing, from `total_entries` when the server reports it
    async fn count(&self, path: &str) -> BackendResult<usize> {
        let query = [("offset", "0".to_string()), ("limit", self.page_size.to_string())];
        let first: Listing<serde_json::Value> = self.get_json(path, &query).await?;
        if let Some(total) = first.total_entries() {
            return Ok(total);
        }
        let complete = first.is_complete();
        let first_len = first.into_items().len();
        if complete || first_len < self.page_size {
            return Ok(first_len);
        }
        Ok(self.list_all::<serde_json::Value>(path).await?.len())
    }

    fn transport_error(&self, endpoint: &str, e: &reqwest::Error) -> BackendError {
        if e.is_timeout() {
            log::warn!("{}: no response within {:?}", endpoint, self.request_timeout);
            return BackendError::Timeout(self.request_timeout);
        }
        if e.is_connect() || e.is_request() {
            return BackendError::Unreachable(format!("{}: {}", endpoint, e));
        }
        BackendError::Failed(format!("{}: {}", endpoint, e))
    }

    async fn document_status(&self, document_id: Uuid) -> BackendResult<DocumentRecord> {
        let path = format!("v3/documents/{}", document_id);
        let doc: Envelope<DocumentRecord> = self.get_json(&path, &[]).await?;
        Ok(doc.into_inner())
    }

    async fn document_counts(&self, document_id: Uuid) -> BackendResult<ExtractionCounts> {
        let entity_count = self.count(&format!("v3/documents/{}/entities", document_id)).await?;
        let relationship_count = self.count(&format!("v3/documents/{}/relationships", document_id)).await?;
        Ok(ExtractionCounts {
            entity_count,
            relationship_count,
        })
    }
}

#[async_trait]
impl Backend for R2rClient {
    async fn find_collection(&self, name: &str) -> BackendResult<Option<CollectionHandle>> {
        let collections: Vec<CollectionRecord> = self.list_all("v3/collections").await?;
        Ok(collections
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| CollectionHandle { id: c.id, name: c.name }))
    }

    async fn create_collection(&self, name: &str) -> BackendResult<CollectionHandle> {
        let body = serde_json::json!({
            "name": name,
            "description": format!("Documents ingested into '{}'", name),
        });
        let created: Envelope<CollectionRecord> = self.post_json("v3/collections", Some(&body)).await?;
        let created = created.into_inner();
        Ok(CollectionHandle {
            id: created.id,
            name: created.name,
        })
    }

    async fn list_documents(&self, collection: &CollectionHandle) -> BackendResult<Vec<ExistingDocument>> {
        let path = format!("v3/collections/{}/documents", collection.id);
        let records: Vec<DocumentRecord> = self.list_all(&path).await?;

        let mut documents = Vec::with_capacity(records.len());
        for record in records {
            match record.name() {
                Some(name) => documents.push(ExistingDocument {
                    name,
                    document_id: record.id,
                }),
                None => log::debug!("Document {} has no title, ignored for duplicate check", record.id),
            }
        }
        Ok(documents)
    }

    async fn upload_document(
        &self,
        collection: &CollectionHandle,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: &UploadMetadata,
    ) -> BackendResult<Uuid> {
        let endpoint = "v3/documents";
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| BackendError::Invalid(format!("metadata: {}", e)))?;
        let collection_ids = serde_json::to_string(&[collection.id.to_string()])
            .map_err(|e| BackendError::Invalid(format!("collection_ids: {}", e)))?;

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name.to_string()))
            .text("metadata", metadata_json)
            .text("collection_ids", collection_ids);

        let request = self.request(Method::POST, self.url(endpoint)?).multipart(form);
        let body = self.send(endpoint, request).await?;
        let ack: Envelope<IngestionAck> = parse(endpoint, &body)?;
        let ack = ack.into_inner();
        if let Some(message) = &ack.message {
            log::debug!("{}: {}", file_name, message);
        }
        Ok(ack.document_id)
    }

    async fn extract_entities(&self, document_id: Uuid) -> BackendResult<ExtractionCounts> {
        let path = format!("v3/documents/{}/extract", document_id);
        let ack: Envelope<TaskAck> = self.post_json(&path, None).await?;
        if !ack.into_inner().succeeded() {
            return Err(BackendError::Failed(format!("extraction rejected for {}", document_id)));
        }

        let started = Instant::now();
        loop {
            let doc = self.document_status(document_id).await?;
            match doc.extraction_status {
                // Servers that do not track extraction finish synchronously
                None => break,
                Some(status) if status.is_done() => break,
                Some(ExtractionStatus::Failed) => {
                    return Err(BackendError::Failed(format!("extraction failed for {}", document_id)));
                }
                Some(status) => {
                    if started.elapsed() >= self.extraction_timeout {
                        return Err(BackendError::Timeout(self.extraction_timeout));
                    }
                    log::debug!("Extraction for {} is {:?}, polling again", document_id, status);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        self.document_counts(document_id).await
    }

    async fn build_graph(&self, collection: &CollectionHandle) -> BackendResult<()> {
        let path = format!("v3/graphs/{}/pull", collection.id);
        let ack: Envelope<TaskAck> = self.post_json(&path, None).await?;
        if ack.into_inner().succeeded() {
            Ok(())
        } else {
            Err(BackendError::Failed(format!(
                "graph build for '{}' reported success=false",
                collection.name
            )))
        }
    }

    async fn graph_stats(&self, collection: &CollectionHandle) -> BackendResult<GraphStats> {
        let entity_count = self.count(&format!("v3/graphs/{}/entities", collection.id)).await?;
        let relationship_count = self.count(&format!("v3/graphs/{}/relationships", collection.id)).await?;
        Ok(GraphStats {
            entity_count,
            relationship_count,
        })
    }
}

/// Map a non-2xx response onto the backend error taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let detail = format!("{}: {}", status, excerpt(body));

    if status == StatusCode::CONFLICT || body.to_lowercase().contains("already exists") {
        return BackendError::AlreadyExists(detail);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return BackendError::Quota(detail);
    }
    if status.is_client_error() {
        return BackendError::Invalid(detail);
    }
    BackendError::Failed(detail)
}
