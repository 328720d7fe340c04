//! Index file format.
//!
//! ```text
//! magic        4 bytes   "RBVI"
//! version      u16 LE
//! algorithm    u8        0 = flat, 1 = hnsw
//! dimension    u32 LE    0 for an index that never received a vector
//! entry count  u64 LE
//! model        u16 LE length + UTF-8 bytes (empty when unknown)
//! checksum     32 bytes  SHA-256 of the body
//! body         entry count records, in insertion order:
//!                u16 LE document-id length + UTF-8 bytes
//!                u32 LE chunk index
//!                dimension x f32 LE
//! ```
//!
//! Files are written to a sibling temp file and renamed into place, so a
//! crash mid-write leaves the previous file intact.

use crate::config::IndexAlgorithm;
use crate::error::{Error, Result};
use crate::types::IndexEntry;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const MAGIC: &[u8; 4] = b"RBVI";
const FORMAT_VERSION: u16 = 1;

/// Everything the file carries.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexSnapshot {
    pub algorithm: IndexAlgorithm,
    pub dimension: Option<usize>,
    pub embedding_model: Option<String>,
    pub entries: Vec<IndexEntry>,
}

/// Serialize a snapshot into the on-disk representation.
pub(crate) fn encode<'a, I>(
    algorithm: IndexAlgorithm,
    dimension: Option<usize>,
    embedding_model: Option<&str>,
    count: usize,
    entries: I,
) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, usize, &'a [f32])>,
{
    let dim = dimension.unwrap_or(0);
    let dim32 = u32::try_from(dim)
        .map_err(|_| Error::Configuration(format!("dimension {} too large to persist", dim)))?;

    let mut body = Vec::with_capacity(count * (8 + dim * 4));
    for (document_id, chunk_index, vector) in entries {
        let id_len = u16::try_from(document_id.len()).map_err(|_| {
            Error::Configuration(format!("document id too long to persist: {}", document_id))
        })?;
        let chunk = u32::try_from(chunk_index).map_err(|_| {
            Error::Configuration(format!("chunk index {} too large to persist", chunk_index))
        })?;
        body.extend_from_slice(&id_len.to_le_bytes());
        body.extend_from_slice(document_id.as_bytes());
        body.extend_from_slice(&chunk.to_le_bytes());
        for value in vector {
            body.extend_from_slice(&value.to_le_bytes());
        }
    }

    let model = embedding_model.unwrap_or_default();
    let model_len = u16::try_from(model.len())
        .map_err(|_| Error::Configuration("embedding model name too long".to_string()))?;

    let mut out = Vec::with_capacity(64 + model.len() + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(algorithm.tag());
    out.extend_from_slice(&dim32.to_le_bytes());
    out.extend_from_slice(&(count as u64).to_le_bytes());
    out.extend_from_slice(&model_len.to_le_bytes());
    out.extend_from_slice(model.as_bytes());
    out.extend_from_slice(&Sha256::digest(&body));
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse and integrity-check the on-disk representation.
pub(crate) fn decode(bytes: &[u8]) -> Result<IndexSnapshot> {
    let mut reader = Reader::new(bytes);

    if reader.take(4, "magic")? != MAGIC {
        return Err(corrupt("bad magic bytes"));
    }
    let version = reader.u16("version")?;
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {}", version)));
    }
    let tag = reader.u8("algorithm")?;
    let algorithm = IndexAlgorithm::from_tag(tag)
        .ok_or_else(|| corrupt(format!("unknown algorithm tag {}", tag)))?;
    let dim = reader.u32("dimension")? as usize;
    let count = reader.u64("entry count")?;
    let model_len = reader.u16("model length")? as usize;
    let model = std::str::from_utf8(reader.take(model_len, "model name")?)
        .map_err(|_| corrupt("model name is not UTF-8"))?
        .to_string();
    let checksum = reader.take(32, "checksum")?;
    let body = reader.rest();

    if count > 0 && dim == 0 {
        return Err(corrupt(format!("{} entries declared with dimension 0", count)));
    }
    // Smallest possible record: empty id, chunk index, vector.
    let min_record = 2u64 + 4 + dim as u64 * 4;
    if count.saturating_mul(min_record) > body.len() as u64 {
        return Err(corrupt(format!(
            "header declares {} entries of dimension {} but body holds {} bytes",
            count,
            dim,
            body.len()
        )));
    }
    if Sha256::digest(body).as_slice() != checksum {
        return Err(corrupt("checksum mismatch"));
    }

    let mut body_reader = Reader::new(body);
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id_len = body_reader.u16("document id length")? as usize;
        let document_id = std::str::from_utf8(body_reader.take(id_len, "document id")?)
            .map_err(|_| corrupt("document id is not UTF-8"))?
            .to_string();
        let chunk_index = body_reader.u32("chunk index")? as usize;
        let raw = body_reader.take(dim * 4, "vector")?;
        let vector: Vec<f32> = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(corrupt(format!(
                "non-finite vector for {}#{}",
                document_id, chunk_index
            )));
        }
        entries.push(IndexEntry {
            vector,
            document_id,
            chunk_index,
        });
    }
    if !body_reader.rest().is_empty() {
        return Err(corrupt(format!(
            "{} trailing bytes after {} entries",
            body_reader.rest().len(),
            count
        )));
    }

    Ok(IndexSnapshot {
        algorithm,
        dimension: (dim > 0).then_some(dim),
        embedding_model: (!model.is_empty()).then_some(model),
        entries,
    })
}

/// Write `bytes` to `path` through a temp file and rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote index file");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::CorruptIndex(msg.into())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| corrupt(format!("unexpected end of file reading {}", what)))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let b = self.take(8, what)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}
