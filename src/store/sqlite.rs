//! SQLite-backed [`VectorStore`].
//!
//! Chunks live in one table keyed by `(collection, id)`; embeddings are
//! stored as little-endian f32 BLOBs. Nearest-neighbor search is
//! brute-force cosine distance over the collection, which is adequate
//! for the documentation-sized corpora this pipeline handles.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::models::{ChunkMetadata, DocKind};

use super::{Neighbor, StoredChunk, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add(&self, records: &[StoredChunk]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for rec in records {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO chunks
                    (collection, id, source, chunk_index, doc_kind, total_chunks, text, hash, embedding, ingested_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&self.collection)
            .bind(&rec.chunk.id)
            .bind(&rec.chunk.source)
            .bind(rec.chunk.chunk_index)
            .bind(rec.chunk.doc_kind.as_str())
            .bind(rec.chunk.total_chunks)
            .bind(&rec.chunk.text)
            .bind(&rec.chunk.hash)
            .bind(vec_to_blob(&rec.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let rows = sqlx::query(
            "SELECT text, source, chunk_index, doc_kind, total_chunks, embedding
             FROM chunks WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<Neighbor> = rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let distance = cosine_distance(query, &blob_to_vec(&blob));
                let kind: String = row.get("doc_kind");
                Neighbor {
                    text: row.get("text"),
                    metadata: ChunkMetadata {
                        source: row.get("source"),
                        chunk_index: row.get("chunk_index"),
                        doc_kind: DocKind::parse(&kind),
                        total_chunks: row.get("total_chunks"),
                    },
                    distance,
                }
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
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn document_count(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT source) FROM chunks WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn markup(&self) -> Result<Option<String>> {
        let html: Option<String> =
            sqlx::query_scalar("SELECT html FROM markup WHERE collection = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(html)
    }

    async fn set_markup(&self, source: &str, html: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO markup (collection, source, html, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(collection) DO UPDATE SET
                source = excluded.source,
                html = excluded.html,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.collection)
        .bind(source)
        .bind(html)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM markup WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
