//! Integration tests for persistence, HNSW search and concurrent access.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ragbench_vector::{Error, HnswConfig, IndexConfig, IndexEntry, VectorIndex};
use std::sync::Arc;
use tempfile::TempDir;

fn random_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect())
        .collect()
}

fn populate(index: &VectorIndex, vectors: &[Vec<f32>]) {
    let entries = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| IndexEntry::new(v.clone(), format!("doc-{}", i / 4), i % 4))
        .collect();
    index.add(entries).unwrap();
}

#[tokio::test]
async fn test_persist_load_reproduces_search_results() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vectors").join("default.index");

    let index = VectorIndex::new(IndexConfig::flat().with_embedding_model("stub-8")).unwrap();
    populate(&index, &random_vectors(64, 8, 1));
    index.persist(&path).await.unwrap();

    let loaded = VectorIndex::load(&path, IndexConfig::flat()).await.unwrap();
    assert_eq!(loaded.len(), 64);
    assert_eq!(loaded.dimension(), Some(8));
    assert_eq!(loaded.embedding_model().as_deref(), Some("stub-8"));

    for query in random_vectors(10, 8, 2) {
        let before = index.search(&query, 5, 0.0).unwrap();
        let after = loaded.search(&query, 5, 0.0).unwrap();
        assert_eq!(before, after);
    }
}

#[tokio::test]
async fn test_persist_overwrites_previous_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("default.index");

    let index = VectorIndex::new(IndexConfig::flat()).unwrap();
    index.add(vec![IndexEntry::new(vec![1.0, 0.0], "a", 0)]).unwrap();
    index.persist(&path).await.unwrap();
    index.add(vec![IndexEntry::new(vec![0.0, 1.0], "b", 0)]).unwrap();
    index.persist(&path).await.unwrap();

    let loaded = VectorIndex::load(&path, IndexConfig::flat()).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(!dir.path().join("default.index.tmp").exists());
}

#[tokio::test]
async fn test_load_garbage_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("default.index");
    tokio::fs::write(&path, b"definitely not an index").await.unwrap();

    let result = VectorIndex::load(&path, IndexConfig::flat()).await;
    assert!(matches!(result, Err(Error::CorruptIndex(_))));
}

#[tokio::test]
async fn test_load_rejects_configured_dimension_conflict() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("default.index");

    let index = VectorIndex::new(IndexConfig::flat()).unwrap();
    index.add(vec![IndexEntry::new(vec![1.0, 0.0], "a", 0)]).unwrap();
    index.persist(&path).await.unwrap();

    let result = VectorIndex::load(&path, IndexConfig::flat().with_dimension(384)).await;
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch { expected: 384, actual: 2 })
    ));
}

#[tokio::test]
async fn test_hnsw_index_can_be_loaded_as_flat() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("default.index");
    let vectors = random_vectors(40, 6, 3);

    let hnsw = VectorIndex::new(IndexConfig::hnsw()).unwrap();
    populate(&hnsw, &vectors);
    hnsw.persist(&path).await.unwrap();

    let flat = VectorIndex::load(&path, IndexConfig::flat()).await.unwrap();
    let hits = flat.search(&vectors[7], 1, 0.0).unwrap();
    assert_eq!(hits[0].document_id, "doc-1");
    assert_eq!(hits[0].chunk_index, 3);
}

#[test]
fn test_hnsw_finds_stored_vectors() {
    let vectors = random_vectors(600, 16, 4);
    let config = IndexConfig::hnsw().with_hnsw_config(HnswConfig::default().with_ef_search(32));
    let hnsw = VectorIndex::new(config).unwrap();
    let flat = VectorIndex::new(IndexConfig::flat()).unwrap();
    populate(&hnsw, &vectors);
    populate(&flat, &vectors);

    let mut agree = 0;
    for i in (0..600).step_by(12) {
        let approx = hnsw.search(&vectors[i], 3, 0.0).unwrap();
        let exact = flat.search(&vectors[i], 3, 0.0).unwrap();
        assert!(approx.windows(2).all(|w| w[0].score >= w[1].score));
        if approx.first() == exact.first() {
            agree += 1;
        }
    }
    assert!(agree >= 45, "top-1 agreement too low: {}/50", agree);
}

fn ids(hits: &[ragbench_vector::SearchHit]) -> Vec<String> {
    hits.iter().map(|h| h.document_id.clone()).collect()
}

#[test]
fn test_hnsw_ties_prefer_earliest_entries() {
    let config = IndexConfig::hnsw().with_hnsw_config(HnswConfig::default().with_ef_search(16));
    let hnsw = VectorIndex::new(config).unwrap();
    let flat = VectorIndex::new(IndexConfig::flat()).unwrap();
    let entries: Vec<IndexEntry> = (0..300)
        .map(|i| IndexEntry::new(vec![0.5, 0.5, 0.5, 0.5], format!("doc-{}", i), 0))
        .collect();
    hnsw.add(entries.clone()).unwrap();
    flat.add(entries).unwrap();

    let query = [0.5, 0.5, 0.5, 0.5];
    let approx = hnsw.search(&query, 3, 0.0).unwrap();
    assert_eq!(ids(&approx), vec!["doc-0", "doc-1", "doc-2"]);
    assert_eq!(approx, flat.search(&query, 3, 0.0).unwrap());
}

#[test]
fn test_hnsw_ties_between_scaled_vectors() {
    // v and 2v have identical cosine scores but are distinct graph points.
    let config = IndexConfig::hnsw().with_hnsw_config(HnswConfig::default().with_ef_search(16));
    let hnsw = VectorIndex::new(config).unwrap();
    let flat = VectorIndex::new(IndexConfig::flat()).unwrap();
    let mut entries: Vec<IndexEntry> = random_vectors(200, 4, 9)
        .into_iter()
        .enumerate()
        .map(|(i, v)| IndexEntry::new(v, format!("noise-{}", i), 0))
        .collect();
    entries.extend((0..100).map(|i| {
        let scale = if i % 2 == 0 { 1.0 } else { 2.0 };
        IndexEntry::new(vec![scale, 0.0, 0.0, 0.0], format!("axis-{}", i), 0)
    }));
    hnsw.add(entries.clone()).unwrap();
    flat.add(entries).unwrap();

    let query = [1.0, 0.0, 0.0, 0.0];
    let approx = hnsw.search(&query, 5, 0.0).unwrap();
    assert_eq!(ids(&approx), vec!["axis-0", "axis-1", "axis-2", "axis-3", "axis-4"]);
    assert_eq!(approx, flat.search(&query, 5, 0.0).unwrap());
}

#[test]
fn test_hnsw_survives_document_replacement() {
    let vectors = random_vectors(300, 8, 5);
    let config = IndexConfig::hnsw().with_hnsw_config(HnswConfig::fast().with_ef_search(64));
    let index = VectorIndex::new(config).unwrap();
    populate(&index, &vectors);

    let replacement = vec![vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]];
    let removed = index.replace_document("doc-3", replacement.clone()).unwrap();
    assert_eq!(removed, 4);
    assert_eq!(index.len(), 297);

    let hits = index.search(&replacement[0], 1, 0.0).unwrap();
    assert_eq!(hits[0].document_id, "doc-3");
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_concurrent_adds_and_searches() {
    let index = Arc::new(VectorIndex::new(IndexConfig::flat().with_dimension(4)).unwrap());
    let mut handles = Vec::new();

    for writer in 0..4 {
        let index = index.clone();
        handles.push(tokio::spawn(async move {
            for doc in 0..25 {
                let id = format!("w{}-d{}", writer, doc);
                index
                    .replace_document(&id, vec![vec![1.0, writer as f32, doc as f32, 0.5]; 2])
                    .unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for _ in 0..4 {
        let index = index.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                let hits = index.search(&[1.0, 1.0, 1.0, 1.0], 5, -1.0).unwrap();
                assert!(hits.len() <= 5);
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(index.len(), 200);
    let counts = index.document_chunk_counts();
    assert_eq!(counts.len(), 100);
    assert!(counts.values().all(|&c| c == 2));
}
