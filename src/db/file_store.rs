//! Directory-backed [`DocumentStore`].
//!
//! One JSON file per document (`<id>.json`) holding the document, its
//! chunks and their embeddings. Files are written to `<id>.json.tmp` and
//! renamed into place, so a crash never leaves a half-written record.
//! All records are loaded into memory at open; reads never touch disk.

use super::traits::{validate_chunks, validate_document_id, DocumentStore};
use crate::types::{AppError, Chunk, Document, DocumentSummary, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const EXTENSION: &str = "json";

/// On-disk record for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    document: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding_model: Option<String>,
    #[serde(default)]
    chunks: Vec<Chunk>,
}

impl StoredDocument {
    fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.document.id.clone(),
            source_type: self.document.source_type,
            title: self.document.title().map(str::to_string),
            chunks: self.chunks.len(),
            ingested_at: self.document.ingested_at,
        }
    }
}

pub struct FileDocumentStore {
    root: PathBuf,
    cache: scc::HashMap<String, Arc<StoredDocument>>,
    /// Per-id write locks; entries are never removed.
    locks: scc::HashMap<String, Arc<Mutex<()>>>,
}

impl FileDocumentStore {
    /// Open (creating if needed) the store rooted at `root` and load every record.
    ///
    /// Unreadable records are logged and skipped so one bad file does not
    /// take the service down; a rebuild will not see them.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| storage_error("creating", &root, e))?;

        let mut paths = Vec::new();
        let mut dir = tokio::fs::read_dir(&root)
            .await
            .map_err(|e| storage_error("listing", &root, e))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| storage_error("listing", &root, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                paths.push(path);
            }
        }

        let records = futures::future::join_all(paths.into_iter().map(|path| async move {
            let result = read_record(&path).await;
            (path, result)
        }))
        .await;

        let store = Self {
            root,
            cache: scc::HashMap::new(),
            locks: scc::HashMap::new(),
        };
        for (path, result) in records {
            match result {
                Ok(record) => {
                    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                    if stem != record.document.id {
                        warn!(path = %path.display(), id = %record.document.id, "Document file name does not match its id, skipping");
                        continue;
                    }
                    let _ = store
                        .cache
                        .insert(record.document.id.clone(), Arc::new(record));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document file"),
            }
        }

        info!(root = %store.root.display(), documents = store.cache.len(), "Opened document store");
        Ok(store)
    }

    /// Directory holding the document files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", id, EXTENSION))
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read(id, |_, l| l.clone()) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        match self.locks.insert(id.to_string(), lock.clone()) {
            Ok(()) => lock,
            Err(_) => self.locks.read(id, |_, l| l.clone()).unwrap_or(lock),
        }
    }

    fn cached(&self, id: &str) -> Option<Arc<StoredDocument>> {
        self.cache.read(id, |_, v| v.clone())
    }

    fn require(&self, id: &str) -> Result<Arc<StoredDocument>> {
        self.cached(id)
            .ok_or_else(|| AppError::NotFound(format!("document '{}'", id)))
    }

    /// Write `record` to disk, then publish it to readers. Caller holds the id lock.
    async fn write(&self, record: StoredDocument) -> Result<()> {
        let id = record.document.id.clone();
        let path = self.path_for(&id);
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| AppError::Storage(format!("serializing document '{}': {}", id, e)))?;
        write_atomic(&path, &bytes)
            .await
            .map_err(|e| storage_error("writing", &path, e))?;

        let record = Arc::new(record);
        if self.cache.update(&id, |_, v| *v = record.clone()).is_none() {
            let _ = self.cache.insert(id.clone(), record);
        }
        debug!(id = %id, bytes = bytes.len(), "Wrote document");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn put(&self, document: Document) -> Result<()> {
        validate_document_id(&document.id)?;
        let lock = self.lock_for(&document.id);
        let _guard = lock.lock().await;
        self.write(StoredDocument {
            document,
            embedding_model: None,
            chunks: Vec::new(),
        })
        .await
    }

    async fn get(&self, document_id: &str) -> Result<Document> {
        Ok(self.require(document_id)?.document.clone())
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>> {
        let mut summaries = Vec::with_capacity(self.cache.len());
        self.cache.scan(|_, record| summaries.push(record.summary()));
        summaries.sort_by(|a, b| {
            a.ingested_at
                .cmp(&b.ingested_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.cache.len())
    }

    async fn put_chunks(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<()> {
        validate_chunks(document_id, &chunks)?;
        let lock = self.lock_for(document_id);
        let _guard = lock.lock().await;
        let existing = self.require(document_id)?;
        self.write(StoredDocument {
            document: existing.document.clone(),
            embedding_model: existing.embedding_model.clone(),
            chunks,
        })
        .await
    }

    async fn get_chunk_text(&self, document_id: &str, chunk_index: usize) -> Result<String> {
        self.require(document_id)?
            .chunks
            .get(chunk_index)
            .map(|c| c.text.clone())
            .ok_or_else(|| {
                AppError::NotFound(format!("chunk {} of document '{}'", chunk_index, document_id))
            })
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        Ok(self.require(document_id)?.chunks.clone())
    }

    async fn embedding_model(&self, document_id: &str) -> Result<Option<String>> {
        Ok(self.require(document_id)?.embedding_model.clone())
    }

    async fn put_with_chunks(
        &self,
        document: Document,
        chunks: Vec<Chunk>,
        embedding_model: Option<&str>,
    ) -> Result<()> {
        validate_document_id(&document.id)?;
        validate_chunks(&document.id, &chunks)?;
        let lock = self.lock_for(&document.id);
        let _guard = lock.lock().await;
        self.write(StoredDocument {
            document,
            embedding_model: embedding_model.map(str::to_string),
            chunks,
        })
        .await
    }
}

async fn read_record(path: &Path) -> std::result::Result<StoredDocument, String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Storage(format!("{} {}: {}", action, path.display(), err))
}
