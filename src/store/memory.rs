//! In-memory [`VectorStore`] for tests and ephemeral sessions.
//!
//! Holds everything behind `std::sync::RwLock`; nearest-neighbor search
//! is brute-force cosine distance over the stored vectors.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::ChunkMetadata;

use super::{Neighbor, StoredChunk, VectorStore};

#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<StoredChunk>>,
    markup: RwLock<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn add(&self, records: &[StoredChunk]) -> Result<()> {
        let mut rows = self.rows.write().unwrap();
        for rec in records {
            rows.retain(|r| r.chunk.id != rec.chunk.id);
            rows.push(rec.clone());
        }
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let rows = self.rows.read().unwrap();
        let mut hits: Vec<Neighbor> = rows
            .iter()
            .map(|r| Neighbor {
                text: r.chunk.text.clone(),
                metadata: ChunkMetadata {
                    source: r.chunk.source.clone(),
                    chunk_index: r.chunk.chunk_index,
                    doc_kind: r.chunk.doc_kind,
                    total_chunks: r.chunk.total_chunks,
                },
                distance: cosine_distance(query, &r.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn chunk_count(&self) -> Result<u64> {
        Ok(self.rows.read().unwrap().len() as u64)
    }

    async fn document_count(&self) -> Result<u64> {
        let rows = self.rows.read().unwrap();
        let mut sources: Vec<&str> = rows.iter().map(|r| r.chunk.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        Ok(sources.len() as u64)
    }

    async fn markup(&self) -> Result<Option<String>> {
        Ok(self.markup.read().unwrap().clone())
    }

    async fn set_markup(&self, _source: &str, html: &str) -> Result<()> {
        *self.markup.write().unwrap() = Some(html.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.rows.write().unwrap().clear();
        *self.markup.write().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, DocKind};

    fn stored(id: &str, source: &str, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            chunk: Chunk {
                id: id.to_string(),
                text: format!("text for {}", id),
                source: source.to_string(),
                chunk_index: 0,
                doc_kind: DocKind::Text,
                total_chunks: 1,
                hash: String::new(),
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance() {
        let store = InMemoryStore::new();
        store
            .add(&[
                stored("far_chunk_0", "far.md", vec![0.0, 1.0]),
                stored("near_chunk_0", "near.md", vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        let hits = store.nearest(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.source, "near.md");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_k_larger_than_store_is_clamped() {
        let store = InMemoryStore::new();
        store
            .add(&[stored("a_chunk_0", "a.md", vec![1.0, 0.0])])
            .await
            .unwrap();
        let hits = store.nearest(&[1.0, 0.0], 50).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_add_replaces_same_id() {
        let store = InMemoryStore::new();
        store
            .add(&[stored("a_chunk_0", "a.md", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .add(&[stored("a_chunk_0", "a.md", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_chunks_and_markup() {
        let store = InMemoryStore::new();
        store
            .add(&[stored("a_chunk_0", "a.md", vec![1.0])])
            .await
            .unwrap();
        store.set_markup("page.html", "<html></html>").await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 0);
        assert_eq!(store.document_count().await.unwrap(), 0);
        assert!(store.markup().await.unwrap().is_none());
    }
}
