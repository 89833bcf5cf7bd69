//! Query-time retrieval over the indexed knowledge base
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::db::{Database, DocumentMatch};
use crate::llm::Embedder;

const QUERY_CACHE_CAPACITY: u64 = 1_000;
const QUERY_CACHE_TTL: Duration = Duration::from_secs(600);

pub struct Retriever {
    database: Arc<Database>,
    embedder: Arc<dyn Embedder>,
    query_cache: Cache<String, Arc<Vec<f32>>>,
}

impl Retriever {
    pub fn new(database: Arc<Database>, embedder: Arc<dyn Embedder>) -> Self {
        let query_cache = Cache::builder()
            .max_capacity(QUERY_CACHE_CAPACITY)
            .time_to_live(QUERY_CACHE_TTL)
            .build();
        Self { database, embedder, query_cache }
    }

    /// Chunks most similar to `query`, best first. Returns nothing without
    /// calling the embedder when no documents are indexed.
    pub async fn search(
        &self,
        query: &str,
        threshold: f32,
        count: usize,
    ) -> anyhow::Result<Vec<DocumentMatch>> {
        let query = query.trim();
        if query.is_empty() || count == 0 {
            return Ok(Vec::new());
        }
        if self.database.documents.count()? == 0 {
            debug!("Knowledge base is empty, skipping retrieval");
            return Ok(Vec::new());
        }

        let embedding = self.embed_query(query).await?;
        let matches = self.database.documents.match_documents(&embedding, threshold, count)?;
        debug!("Retrieved {} chunks above {:.2} for query", matches.len(), threshold);
        Ok(matches)
    }

    async fn embed_query(&self, query: &str) -> anyhow::Result<Arc<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        self.query_cache
            .try_get_with(query.to_string(), async move {
                let mut vectors = embedder.embed(std::slice::from_ref(&text)).await?;
                vectors
                    .pop()
                    .map(Arc::new)
                    .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vector"))
            })
            .await
            .map_err(|e: Arc<anyhow::Error>| anyhow::anyhow!("Query embedding failed: {}", e))
    }
}
