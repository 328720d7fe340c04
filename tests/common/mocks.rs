//! Test doubles for the embedding, storage and fetching seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use ragbench::rag::fetch::{ContentFetcher, FetchedContent};
use ragbench::types::{AppError, Chunk, Document, DocumentSummary, Result};
use ragbench::{DocumentStore, Embedder, EmbeddingError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Keywords mapped to vector axes by [`StubEmbedder`].
pub const KEYWORDS: [&str; 4] = ["rust", "python", "ocean", "music"];

/// Deterministic embedder with hand-checkable vectors.
///
/// Axis `i` counts occurrences of `KEYWORDS[i]`; every axis also gets a
/// small constant so no text embeds to the zero vector. Can be switched to
/// fail every call.
pub struct StubEmbedder {
    model: String,
    failure: Mutex<Option<EmbeddingError>>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::with_model("stub-embedder")
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// An embedder whose calls all time out.
    pub fn timing_out() -> Self {
        let embedder = Self::new();
        embedder.fail_with(EmbeddingError::Timeout(Duration::from_secs(30)));
        embedder
    }

    pub fn fail_with(&self, error: EmbeddingError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32 + 0.01)
            .collect()
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

/// Fetcher returning a fixed page for any URL.
#[derive(Default)]
pub struct StaticFetcher {
    pub title: Option<String>,
    pub text: String,
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        if self.text.is_empty() {
            return Err(AppError::Fetch(format!("{} is unreachable", url)));
        }
        Ok(FetchedContent {
            url: url.to_string(),
            title: self.title.clone(),
            text: self.text.clone(),
        })
    }
}

/// Store whose writes always fail; reads see an empty store.
#[derive(Default)]
pub struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn put(&self, _document: Document) -> Result<()> {
        Err(AppError::Storage("disk full".to_string()))
    }

    async fn get(&self, document_id: &str) -> Result<Document> {
        Err(AppError::NotFound(document_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>> {
        Ok(Vec::new())
    }

    async fn put_chunks(&self, _document_id: &str, _chunks: Vec<Chunk>) -> Result<()> {
        Err(AppError::Storage("disk full".to_string()))
    }

    async fn get_chunk_text(&self, document_id: &str, chunk_index: usize) -> Result<String> {
        Err(AppError::NotFound(format!("{}#{}", document_id, chunk_index)))
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        Err(AppError::NotFound(document_id.to_string()))
    }

    async fn embedding_model(&self, document_id: &str) -> Result<Option<String>> {
        Err(AppError::NotFound(document_id.to_string()))
    }
}
