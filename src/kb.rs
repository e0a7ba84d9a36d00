//! The knowledge base: the central retrieval engine.
//!
//! Owns chunking, embedding invocation, vector-store interaction, and
//! the running counters. One instance serves one logical session; hosts
//! needing multi-session sharing isolate by instance, not by locking.
//!
//! The vector store is the single source of truth for persisted chunks;
//! the counters here are a derived cache that only [`ingest`] and
//! [`reset`] may move.
//!
//! [`ingest`]: KnowledgeBase::ingest
//! [`reset`]: KnowledgeBase::reset

use anyhow::{bail, Result};

use crate::chunk::{chunk_document, Chunker};
use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingProvider;
use crate::models::{DocKind, DocumentRecord, IngestResult, KbStats, QueryMatch, QueryResults};
use crate::store::{StoredChunk, VectorStore};

pub struct KnowledgeBase {
    store: Box<dyn VectorStore>,
    embedder: Box<dyn EmbeddingProvider>,
    chunker: Chunker,
    document_count: u64,
    chunk_count: u64,
    /// Raw text of the most recently ingested HTML document. Single
    /// slot, overwritten on each markup ingestion.
    raw_html: Option<String>,
}

impl KnowledgeBase {
    /// Open a knowledge base over an existing collection, seeding the
    /// counters and markup slot from what the store already holds.
    pub async fn open(
        store: Box<dyn VectorStore>,
        embedder: Box<dyn EmbeddingProvider>,
        chunking: &ChunkingConfig,
    ) -> Result<Self> {
        let chunk_count = store.chunk_count().await?;
        let document_count = store.document_count().await?;
        let raw_html = store.markup().await?;

        Ok(Self {
            store,
            embedder,
            chunker: Chunker::new(chunking.max_bytes, chunking.overlap_bytes),
            document_count,
            chunk_count,
            raw_html,
        })
    }

    /// Ingest a single parsed document: chunk, embed (one batch call),
    /// persist (one batch write), then refresh the counters from the
    /// store.
    ///
    /// A document that chunks to nothing (empty content) is a no-op
    /// reported as success with zero chunks, and leaves the counters
    /// untouched.
    pub async fn ingest(&mut self, record: &DocumentRecord) -> Result<IngestResult> {
        if record.kind == DocKind::Html {
            let html = record
                .raw_html
                .clone()
                .unwrap_or_else(|| record.content.clone());
            self.store.set_markup(&record.source, &html).await?;
            self.raw_html = Some(html);
        }

        let chunks = chunk_document(record, &self.chunker);
        if chunks.is_empty() {
            return Ok(IngestResult {
                filename: record.source.clone(),
                kind: record.kind,
                chunks_created: 0,
                success: true,
                error: None,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let records: Vec<StoredChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk { chunk, embedding })
            .collect();
        let created = records.len();

        self.store.add(&records).await?;
        // Chunk ids are deterministic, so re-ingesting a source replaces
        // its rows. Counters are re-read from the store rather than
        // incremented so they never drift from what is persisted.
        self.chunk_count = self.store.chunk_count().await?;
        self.document_count = self.store.document_count().await?;

        Ok(IngestResult {
            filename: record.source.clone(),
            kind: record.kind,
            chunks_created: created,
            success: true,
            error: None,
        })
    }

    /// Ingest documents independently, in input order. One record's
    /// failure is captured in its result and does not abort the batch,
    /// so callers can correlate files to outcomes positionally.
    pub async fn ingest_many(&mut self, records: &[DocumentRecord]) -> Vec<IngestResult> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let result = match self.ingest(record).await {
                Ok(r) => r,
                Err(e) => IngestResult {
                    filename: record.source.clone(),
                    kind: record.kind,
                    chunks_created: 0,
                    success: false,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }
        results
    }

    /// Semantic search: embed the query once and return the
    /// `min(k, chunk_count)` nearest chunks, closest first.
    ///
    /// An empty knowledge base short-circuits to a sentinel result
    /// without touching the embedding provider.
    pub async fn query(&self, text: &str, k: usize) -> Result<QueryResults> {
        if self.chunk_count == 0 {
            return Ok(QueryResults {
                matches: Vec::new(),
                message: Some("Knowledge base is empty".to_string()),
            });
        }

        let vector = self.embedder.embed_query(text).await?;
        let k = k.min(self.chunk_count as usize);
        let hits = self.store.nearest(&vector, k).await?;

        Ok(QueryResults {
            matches: hits
                .into_iter()
                .map(|h| QueryMatch {
                    text: h.text,
                    metadata: h.metadata,
                    distance: h.distance,
                })
                .collect(),
            message: None,
        })
    }

    /// The last-ingested raw HTML, if any page markup was ever ingested.
    pub fn markup(&self) -> Option<&str> {
        self.raw_html.as_deref()
    }

    pub fn stats(&self) -> KbStats {
        KbStats {
            document_count: self.document_count,
            chunk_count: self.chunk_count,
            has_html: self.raw_html.is_some(),
        }
    }

    /// Clear the collection, counters, and markup slot together. The
    /// store is cleared first so a failure never leaves the counters
    /// disagreeing with the persisted contents.
    pub async fn reset(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.document_count = 0;
        self.chunk_count = 0;
        self.raw_html = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Deterministic embedder: a letter-histogram vector, so related
    /// texts land near each other without any network access.
    struct HistogramEmbedder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingProvider for HistogramEmbedder {
        fn model_name(&self) -> &str {
            "histogram-test"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.chars().filter(|c| c.is_ascii_alphabetic()) {
                        v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    async fn test_kb() -> (KnowledgeBase, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let kb = KnowledgeBase::open(
            Box::new(InMemoryStore::new()),
            Box::new(HistogramEmbedder {
                calls: calls.clone(),
            }),
            &ChunkingConfig::default(),
        )
        .await
        .unwrap();
        (kb, calls)
    }

    fn doc(source: &str, content: &str) -> DocumentRecord {
        DocumentRecord {
            content: content.to_string(),
            source: source.to_string(),
            kind: DocKind::Text,
            raw_html: None,
        }
    }

    #[tokio::test]
    async fn test_empty_document_is_a_noop() {
        let (mut kb, _) = test_kb().await;
        let result = kb.ingest(&doc("empty.txt", "")).await.unwrap();
        assert!(result.success);
        assert_eq!(result.chunks_created, 0);
        assert_eq!(kb.stats().document_count, 0);
        assert_eq!(kb.stats().chunk_count, 0);
    }

    #[tokio::test]
    async fn test_small_document_is_one_chunk() {
        let (mut kb, _) = test_kb().await;
        let result = kb.ingest(&doc("notes.txt", "Short note.")).await.unwrap();
        assert_eq!(result.chunks_created, 1);
        assert_eq!(
            kb.stats(),
            KbStats {
                document_count: 1,
                chunk_count: 1,
                has_html: false
            }
        );
    }

    #[tokio::test]
    async fn test_reingest_same_source_does_not_inflate_counters() {
        let (mut kb, _) = test_kb().await;
        kb.ingest(&doc("auth.md", "alpha beta gamma")).await.unwrap();
        kb.ingest(&doc("auth.md", "alpha beta gamma delta"))
            .await
            .unwrap();

        assert_eq!(
            kb.stats(),
            KbStats {
                document_count: 1,
                chunk_count: 1,
                has_html: false
            }
        );
        // The replacement wins; the old text is gone.
        let results = kb.query("alpha", 10).await.unwrap();
        assert_eq!(results.matches.len(), 1);
        assert!(results.matches[0].text.contains("delta"));
    }

    #[tokio::test]
    async fn test_query_on_empty_kb_skips_embedder() {
        let (kb, calls) = test_kb().await;
        let results = kb.query("anything", 5).await.unwrap();
        assert!(results.matches.is_empty());
        assert_eq!(results.message.as_deref(), Some("Knowledge base is empty"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_clamps_k_to_chunk_count() {
        let (mut kb, _) = test_kb().await;
        kb.ingest(&doc("a.txt", "alpha beta gamma")).await.unwrap();
        let results = kb.query("alpha", 100).await.unwrap();
        assert_eq!(results.matches.len(), 1);
        assert!(results.message.is_none());
    }

    #[tokio::test]
    async fn test_reset_restores_fresh_state() {
        let (mut kb, calls) = test_kb().await;
        kb.ingest(&doc("a.txt", "alpha beta gamma")).await.unwrap();
        kb.reset().await.unwrap();

        assert_eq!(
            kb.stats(),
            KbStats {
                document_count: 0,
                chunk_count: 0,
                has_html: false
            }
        );
        let before = calls.load(Ordering::SeqCst);
        let results = kb.query("alpha", 5).await.unwrap();
        assert!(results.matches.is_empty());
        assert!(results.message.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), before);
    }
}
