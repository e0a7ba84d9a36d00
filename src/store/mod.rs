//! Vector-store abstraction for QA-Forge.
//!
//! The [`VectorStore`] trait defines the persistence operations the
//! knowledge base needs: batch chunk writes, nearest-neighbor lookup,
//! counters, the single-slot page markup, and a collection-wide clear.
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! Backends: [`sqlite::SqliteStore`] (persistent, the default) and
//! [`memory::InMemoryStore`] (tests and ephemeral sessions).

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ChunkMetadata};

/// A chunk with its embedding, ready for persistence.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// One nearest-neighbor hit, with full provenance metadata.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance; smaller is closer.
    pub distance: f32,
}

/// Abstract vector store, the single source of truth for persisted
/// chunks. The knowledge base's counters are a cache over these
/// contents and only [`add`](VectorStore::add) and
/// [`clear`](VectorStore::clear) may move them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist a batch of chunks with their embeddings as one write.
    async fn add(&self, records: &[StoredChunk]) -> Result<()>;

    /// Return up to `k` stored chunks nearest to `query`, ascending by
    /// distance. `k` larger than the stored count is not an error.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Total chunks in the collection.
    async fn chunk_count(&self) -> Result<u64>;

    /// Distinct sources in the collection.
    async fn document_count(&self) -> Result<u64>;

    /// The most recently stored raw page markup, if any.
    async fn markup(&self) -> Result<Option<String>>;

    /// Overwrite the single markup slot.
    async fn set_markup(&self, source: &str, html: &str) -> Result<()>;

    /// Remove every chunk and the markup slot, as one operation.
    async fn clear(&self) -> Result<()>;
}
