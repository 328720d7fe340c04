//! One-shot commands that run against a locally opened [`RagService`].

use super::output::Output;
use crate::rag::service::RagService;
use crate::types::{
    AppError, IngestRequest, Metadata, MetadataValue, QueryRequest, Result, SourceType,
};
use std::path::PathBuf;

/// Arguments of the `ingest` subcommand.
#[derive(Debug, Default)]
pub struct IngestArgs {
    pub file: Option<PathBuf>,
    pub text: Option<String>,
    pub url: Option<String>,
    pub source_type: Option<String>,
    pub id: Option<String>,
    pub metadata: Vec<String>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub normalize: bool,
}

/// Parse repeated `key=value` arguments.
///
/// Values that parse as integers, floats or booleans keep that type.
pub fn parse_metadata(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            AppError::InvalidInput(format!("metadata '{}' is not in key=value form", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::InvalidInput(format!("metadata '{}' has an empty key", pair)));
        }
        let value = if let Ok(i) = value.parse::<i64>() {
            MetadataValue::Int(i)
        } else if let Ok(f) = value.parse::<f64>() {
            MetadataValue::Float(f)
        } else if let Ok(b) = value.parse::<bool>() {
            MetadataValue::Bool(b)
        } else {
            MetadataValue::String(value.to_string())
        };
        metadata.insert(key.to_string(), value);
    }
    Ok(metadata)
}

pub async fn ingest(service: &RagService, args: IngestArgs, output: &Output) -> Result<()> {
    let mut metadata = parse_metadata(&args.metadata)?;
    let content = match args.file {
        Some(ref path) => {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                AppError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
            })?;
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                metadata
                    .entry("title".to_string())
                    .or_insert_with(|| MetadataValue::String(name.to_string()));
            }
            Some(text)
        }
        None => args.text,
    };
    let source_type = args
        .source_type
        .as_deref()
        .map(str::parse::<SourceType>)
        .transpose()?;

    let response = service
        .ingest(IngestRequest {
            content,
            url: args.url,
            metadata,
            source_type,
            document_id: args.id,
            chunk_size: args.chunk_size,
            chunk_overlap: args.chunk_overlap,
            normalize: args.normalize,
        })
        .await?;

    output.success(&format!("Ingested {}", response.document_id));
    output.kv("chunks", &response.chunks.to_string());
    output.kv("vector_store_size", &response.vector_store_size.to_string());
    Ok(())
}

pub async fn query(
    service: &RagService,
    text: String,
    top_k: Option<usize>,
    threshold: Option<f32>,
    output: &Output,
) -> Result<()> {
    let response = service
        .query(QueryRequest {
            query: text,
            top_k,
            threshold,
        })
        .await?;

    if let Some(error) = response.error {
        return Err(AppError::Internal(format!("query failed: {}", error)));
    }
    output.header(&format!(
        "{} result(s) in {:.1} ms",
        response.total_results, response.query_time_ms
    ));
    for (rank, item) in response.results.iter().enumerate() {
        let source = format!("{}#{}", item.document_id, item.chunk_index);
        output.result(rank + 1, item.similarity, &source, &item.content);
    }
    Ok(())
}

pub async fn status(service: &RagService, output: &Output) -> Result<()> {
    let status = service.status().await?;
    output.header("Status");
    output.kv("vector_store_size", &status.vector_store_size.to_string());
    output.kv("document_count", &status.document_count.to_string());
    output.kv("embedding_model", &status.embedding_model);
    output.kv(
        "embedding_dimension",
        &status
            .embedding_dimension
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    output.kv("index_algorithm", &status.index_algorithm);
    output.kv("chunk_size", &status.chunk_size.to_string());
    output.kv("chunk_overlap", &status.chunk_overlap.to_string());

    let report = service.reconcile().await?;
    if report.is_consistent() {
        output.success("Index is in sync with the document store");
    } else {
        output.warning(&format!(
            "Index out of sync: {} document(s) missing, {} orphaned",
            report.missing.len(),
            report.orphaned.len()
        ));
        output.hint("Run `ragbench-server rebuild` to reconstruct the index");
    }

    let documents = service.list_documents().await?;
    if !documents.documents.is_empty() {
        output.header("Documents");
        output.table_header(&["Id", "Source", "Chunks"]);
        for doc in &documents.documents {
            let chunks = doc.chunks.to_string();
            output.table_row(&[&doc.id, doc.source_type.as_str(), &chunks]);
        }
    }
    Ok(())
}

pub async fn rebuild(service: &RagService, output: &Output) -> Result<()> {
    let response = service.rebuild().await?;
    output.success("Vector index rebuilt");
    output.kv("documents", &response.documents.to_string());
    output.kv("vector_store_size", &response.vector_store_size.to_string());
    output.kv("reembedded", &response.reembedded.to_string());
    Ok(())
}
