//! Document chunk storage and similarity search with ANN indexing support
use crate::db::schema::*;
use chrono::Utc;
use hora::core::ann_index::ANNIndex;
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

pub struct DocumentStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
    dimension: usize,
    embedding_model: String,
    ann_index: RwLock<Option<HNSWIndex<f32, i64>>>,
    embedding_cache: RwLock<HashMap<i64, Vec<f32>>>,
}

impl DocumentStore {
    pub fn new(
        pool: Arc<Pool<SqliteConnectionManager>>,
        dimension: usize,
        embedding_model: &str,
    ) -> Self {
        Self {
            pool,
            dimension,
            embedding_model: embedding_model.to_string(),
            ann_index: RwLock::new(None),
            embedding_cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    fn index_read(&self) -> anyhow::Result<RwLockReadGuard<'_, Option<HNSWIndex<f32, i64>>>> {
        self.ann_index.read().map_err(|_| anyhow::anyhow!("Document index lock poisoned"))
    }

    fn index_write(&self) -> anyhow::Result<RwLockWriteGuard<'_, Option<HNSWIndex<f32, i64>>>> {
        self.ann_index.write().map_err(|_| anyhow::anyhow!("Document index lock poisoned"))
    }

    fn cache_read(&self) -> anyhow::Result<RwLockReadGuard<'_, HashMap<i64, Vec<f32>>>> {
        self.embedding_cache.read().map_err(|_| anyhow::anyhow!("Embedding cache lock poisoned"))
    }

    fn cache_write(&self) -> anyhow::Result<RwLockWriteGuard<'_, HashMap<i64, Vec<f32>>>> {
        self.embedding_cache.write().map_err(|_| anyhow::anyhow!("Embedding cache lock poisoned"))
    }

    /// Loads every stored embedding into the HNSW index. With no documents
    /// the index stays unset and searches use the linear scan.
    pub fn initialize_index(&self) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, embedding FROM documents WHERE embedding_model = ?1",
        )?;
        let mut rows = stmt.query([&self.embedding_model])?;

        let params = HNSWParams::<f32> {
            n_neighbor: 16,
            ef_build: 100,
            ef_search: 64,
            ..Default::default()
        };
        let mut index = HNSWIndex::<f32, i64>::new(self.dimension, &params);
        let mut cache = HashMap::new();

        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(1)?;
            let embedding: Vec<f32> = bincode::deserialize(&embedding_bytes)
                .map_err(|e| anyhow::anyhow!("Deserialization error for document {}: {}", id, e))?;
            if embedding.len() != self.dimension {
                warn!("Skipping document {} with dimension {} (expected {})",
                    id, embedding.len(), self.dimension);
                continue;
            }
            index
                .add(&normalized(&embedding), id)
                .map_err(|e| anyhow::anyhow!("Failed to add document {} to index: {}", id, e))?;
            cache.insert(id, embedding);
        }

        let loaded = cache.len();
        if loaded == 0 {
            *self.index_write()? = None;
            *self.cache_write()? = cache;
            debug!("No documents indexed yet; similarity search will use linear scan");
            return Ok(0);
        }

        // Vectors are unit length, so Euclidean order equals cosine order.
        index
            .build(Metric::Euclidean)
            .map_err(|e| anyhow::anyhow!("Failed to build index: {}", e))?;

        *self.index_write()? = Some(index);
        *self.cache_write()? = cache;
        info!("ANN index initialized with {} document chunks", loaded);
        Ok(loaded)
    }

    /// Inserts one chunk. The ANN index is dropped until the next
    /// `initialize_index`, so searches in between fall back to a scan.
    pub fn insert(&self, document: &NewDocument) -> anyhow::Result<i64> {
        self.check_dimension(&document.embedding)?;
        let conn = self.get_conn()?;
        let id = Self::insert_with_conn(&conn, document, &self.embedding_model)?;
        *self.index_write()? = None;
        self.cache_write()?.insert(id, document.embedding.clone());
        Ok(id)
    }

    /// Deletes every stored chunk, then writes `documents` in one
    /// transaction and rebuilds the index.
    pub fn replace_all(&self, documents: &[NewDocument]) -> anyhow::Result<usize> {
        for document in documents {
            self.check_dimension(&document.embedding)?;
        }
        {
            let mut conn = self.get_conn()?;
            let tx = conn.transaction()?;
            let deleted = tx.execute("DELETE FROM documents", [])?;
            for document in documents {
                Self::insert_with_conn(&tx, document, &self.embedding_model)?;
            }
            tx.commit()?;
            info!("Replaced {} document chunks with {}", deleted, documents.len());
        }
        self.initialize_index()?;
        Ok(documents.len())
    }

    pub fn clear(&self) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM documents", [])?;
        *self.index_write()? = None;
        self.cache_write()?.clear();
        Ok(deleted)
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn sample(&self, limit: usize) -> anyhow::Result<Vec<StoredDocument>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, metadata, embedding_model, created_at
             FROM documents ORDER BY id ASC LIMIT ?1",
        )?;
        let documents = stmt
            .query_map([limit as i64], row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(documents)
    }

    /// Cosine-similarity search returning chunks scoring above `threshold`,
    /// best first, at most `count` of them.
    pub fn match_documents(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> anyhow::Result<Vec<DocumentMatch>> {
        self.check_dimension(query_embedding)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        // Over-fetch from the ANN index, then rescore exactly.
        let indexed = {
            let index_guard = self.index_read()?;
            match &*index_guard {
                Some(index) => {
                    let cache = self.cache_read()?;
                    let mut scored: Vec<(i64, f32)> = index
                        .search(&normalized(query_embedding), count.saturating_mul(4))
                        .into_iter()
                        .filter_map(|id| {
                            cache.get(&id).map(|embedding| (id, cosine_similarity(query_embedding, embedding)))
                        })
                        .filter(|(_, sim)| *sim > threshold)
                        .collect();
                    sort_by_similarity(&mut scored);
                    scored.truncate(count);
                    Some(scored)
                }
                None => None,
            }
        };
        let scored = match indexed {
            Some(scored) => scored,
            None => {
                debug!("ANN index not available, using linear search");
                self.linear_scores(query_embedding, threshold, count)?
            }
        };

        let conn = self.get_conn()?;
        let mut matches = Vec::with_capacity(scored.len());
        for (id, similarity) in scored {
            let document = conn.query_row(
                "SELECT id, content, metadata, embedding_model, created_at FROM documents WHERE id = ?1",
                [id],
                row_to_document,
            )?;
            matches.push(DocumentMatch {
                id: document.id,
                content: document.content,
                metadata: document.metadata,
                similarity,
            });
        }
        Ok(matches)
    }

    fn linear_scores(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> anyhow::Result<Vec<(i64, f32)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, embedding FROM documents WHERE embedding_model = ?1",
        )?;
        let mut rows = stmt.query([&self.embedding_model])?;

        let mut matches = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(1)?;
            let embedding: Vec<f32> = bincode::deserialize(&embedding_bytes)
                .map_err(|e| anyhow::anyhow!("Bincode error: {}", e))?;

            let sim = cosine_similarity(query_embedding, &embedding);
            if sim > threshold {
                matches.push((id, sim));
            }
        }

        sort_by_similarity(&mut matches);
        matches.truncate(count);
        Ok(matches)
    }

    fn check_dimension(&self, embedding: &[f32]) -> anyhow::Result<()> {
        if embedding.len() != self.dimension {
            return Err(anyhow::anyhow!(
                "Embedding has {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            ));
        }
        Ok(())
    }

    fn insert_with_conn(conn: &Connection, document: &NewDocument, model: &str) -> anyhow::Result<i64> {
        let embedding_bytes = bincode::serialize(&document.embedding)?;
        conn.execute(
            "INSERT INTO documents (content, metadata, embedding, embedding_model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document.content,
                serde_json::to_string(&document.metadata)?,
                embedding_bytes,
                model,
                timestamp(Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

fn row_to_document(row: &Row) -> rusqlite::Result<StoredDocument> {
    let metadata_json: String = row.get(2)?;
    let metadata: DocumentMetadata = serde_json::from_str(&metadata_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: String = row.get(4)?;
    Ok(StoredDocument {
        id: row.get(0)?,
        content: row.get(1)?,
        metadata,
        embedding_model: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

fn sort_by_similarity(scored: &mut [(i64, f32)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() { return 0.0; }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn chunk(content: &str, embedding: Vec<f32>) -> NewDocument {
        NewDocument {
            content: content.to_string(),
            metadata: DocumentMetadata {
                source: format!("{}.md", content),
                category: "general".to_string(),
                title: content.to_string(),
                section: None,
            },
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_linear_search_filters_and_orders() {
        let db = Database::new_in_memory().unwrap();
        db.documents.insert(&chunk("tax", vec![1.0, 0.0, 0.0, 0.0])).unwrap();
        db.documents.insert(&chunk("visa", vec![0.0, 1.0, 0.0, 0.0])).unwrap();
        db.documents.insert(&chunk("tax-ish", vec![0.9, 0.1, 0.0, 0.0])).unwrap();

        let matches = db.documents.match_documents(&[1.0, 0.0, 0.0, 0.0], 0.7, 5).unwrap();

        let names: Vec<&str> = matches.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(names, vec!["tax", "tax-ish"]);
        assert!(matches[0].similarity >= matches[1].similarity);
    }

    #[test]
    fn test_match_count_limits_results() {
        let db = Database::new_in_memory().unwrap();
        for i in 0..4 {
            db.documents
                .insert(&chunk(&format!("doc{}", i), vec![1.0, 0.01 * i as f32, 0.0, 0.0]))
                .unwrap();
        }

        let matches = db.documents.match_documents(&[1.0, 0.0, 0.0, 0.0], 0.5, 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].content, "doc0");
    }

    #[test]
    fn test_replace_all_discards_previous_rows() {
        let db = Database::new_in_memory().unwrap();
        db.documents.insert(&chunk("stale", vec![1.0, 0.0, 0.0, 0.0])).unwrap();

        let written = db
            .documents
            .replace_all(&[
                chunk("housing", vec![0.0, 0.0, 1.0, 0.0]),
                chunk("skat", vec![0.0, 0.0, 0.0, 1.0]),
            ])
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(db.documents.count().unwrap(), 2);
        let titles: Vec<String> = db
            .documents
            .sample(10)
            .unwrap()
            .into_iter()
            .map(|d| d.metadata.title)
            .collect();
        assert_eq!(titles, vec!["housing", "skat"]);
    }

    #[test]
    fn test_indexed_search_finds_nearest() {
        let db = Database::new_in_memory().unwrap();
        db.documents
            .replace_all(&[
                chunk("housing", vec![0.0, 0.0, 1.0, 0.0]),
                chunk("skat", vec![0.0, 0.0, 0.0, 1.0]),
            ])
            .unwrap();

        let matches = db.documents.match_documents(&[0.0, 0.0, 0.0, 1.0], 0.7, 1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].content, "skat");
    }

    #[test]
    fn test_indexed_search_over_many_chunks() {
        let db = Database::new_in_memory().unwrap();
        let documents: Vec<NewDocument> = (0..60)
            .map(|i| {
                let angle = i as f32 * 0.05;
                chunk(&format!("doc{}", i), vec![angle.cos(), angle.sin(), 0.1 * (i % 7) as f32, 1.0])
            })
            .collect();
        let query = documents[17].embedding.clone();

        assert_eq!(db.documents.replace_all(&documents).unwrap(), 60);
        assert!(db.documents.index_read().unwrap().is_some());

        let matches = db.documents.match_documents(&query, 0.5, 5).unwrap();
        assert!(!matches.is_empty() && matches.len() <= 5);
        assert_eq!(matches[0].content, "doc17");
        assert!((matches[0].similarity - 1.0).abs() < 1e-5);
        assert!(matches.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_normalized_is_unit_length() {
        let v = normalized(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalized(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.documents.insert(&chunk("bad", vec![1.0, 0.0])).is_err());
        assert!(db.documents.match_documents(&[1.0], 0.5, 5).is_err());
    }

    #[test]
    fn test_clear_empties_store() {
        let db = Database::new_in_memory().unwrap();
        db.documents.insert(&chunk("a", vec![1.0, 0.0, 0.0, 0.0])).unwrap();

        assert_eq!(db.documents.clear().unwrap(), 1);
        assert_eq!(db.documents.count().unwrap(), 0);
        assert!(db.documents.match_documents(&[1.0, 0.0, 0.0, 0.0], 0.0, 5).unwrap().is_empty());
    }
}
