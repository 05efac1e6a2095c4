use crate::error::{Result, SearchError};
use crate::query::{QueryEngine, SearchHit};
use semindex_vector_store::{
    DocId, Document, Embedder, HnswIndex, IndexConfig, IndexStats, Remap, VectorStoreError,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Result count used when the caller has no preference.
pub const DEFAULT_TOP_K: usize = 5;

/// Text in, ranked documents out.
///
/// Pairs an [`Embedder`] with an [`HnswIndex`]. Embedding happens on the async
/// side; graph work (insertion, persistence) runs on the blocking pool.
pub struct SemanticSearch {
    embedder: Arc<dyn Embedder>,
    engine: QueryEngine,
}

impl SemanticSearch {
    /// Empty index sized for `embedder`.
    pub fn new(embedder: Arc<dyn Embedder>, config: IndexConfig) -> Result<Self> {
        let index = HnswIndex::new(embedder.dimension(), config)?;
        Ok(Self {
            embedder,
            engine: QueryEngine::new(Arc::new(index)),
        })
    }

    /// Wrap an existing index. Its dimension must match the embedder's.
    pub fn with_index(embedder: Arc<dyn Embedder>, index: Arc<HnswIndex>) -> Result<Self> {
        check_dimension(embedder.as_ref(), &index)?;
        Ok(Self {
            embedder,
            engine: QueryEngine::new(index),
        })
    }

    pub fn index_handle(&self) -> &Arc<HnswIndex> {
        self.engine.index()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed and index plain-text documents; the text itself is the payload.
    pub async fn index(&self, documents: Vec<String>) -> Result<Vec<DocId>> {
        let records = documents
            .into_iter()
            .map(|text| {
                let payload = Document::from_text(text.as_str());
                (text, payload)
            })
            .collect();
        self.index_with_payloads(records).await
    }

    /// Embed `text` for each record and store `payload` next to the vector.
    ///
    /// All vectors are validated before the first insert.
    pub async fn index_with_payloads(
        &self,
        records: Vec<(String, Document)>,
    ) -> Result<Vec<DocId>> {
        if records.is_empty() {
            return Err(SearchError::EmptyDocuments);
        }

        log::info!(
            "Indexing {} documents with {}...",
            records.len(),
            self.embedder.model_id()
        );
        let started = Instant::now();

        let (texts, payloads): (Vec<String>, Vec<Document>) = records.into_iter().unzip();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            ))
            .into());
        }

        let index = Arc::clone(self.engine.index());
        let batch: Vec<(Vec<f32>, Document)> = vectors.into_iter().zip(payloads).collect();
        let ids = tokio::task::spawn_blocking(move || index.insert_batch(batch))
            .await
            .map_err(|e| SearchError::Other(format!("Join error: {e}")))??;

        log::info!("Indexed {} documents in {:?}", ids.len(), started.elapsed());
        Ok(ids)
    }

    /// Top `k` documents for `query` at the index's default `ef`.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.run_search(query, k, None).await
    }

    /// Like [`SemanticSearch::search`] with an explicit beam width.
    pub async fn search_with_ef(&self, query: &str, k: usize, ef: usize) -> Result<Vec<SearchHit>> {
        self.run_search(query, k, Some(ef)).await
    }

    async fn run_search(&self, query: &str, k: usize, ef: Option<usize>) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        log::debug!("Semantic search: query='{}', k={}", query, k);
        let vector = self.embedder.embed(query).await?;
        let hits = self.engine.search(&vector, k, ef)?;
        log::debug!("Found {} results", hits.len());
        Ok(hits)
    }

    pub fn delete(&self, id: DocId) -> Result<bool> {
        Ok(self.engine.index().delete(id)?)
    }

    /// Remove tombstones. Ids issued before the call must be translated
    /// through the returned [`Remap`].
    pub fn compact(&self) -> Result<Remap> {
        Ok(self.engine.index().compact()?)
    }

    /// Compact only when the tombstone ratio has reached the configured threshold.
    pub fn compact_if_needed(&self) -> Result<Option<Remap>> {
        let index = self.engine.index();
        if !index.should_compact() {
            return Ok(None);
        }
        Ok(Some(index.compact()?))
    }

    pub fn stats(&self) -> IndexStats {
        self.engine.index().stats()
    }

    /// Live documents.
    pub fn len(&self) -> usize {
        self.engine.index().live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let index = Arc::clone(self.engine.index());
        tokio::task::spawn_blocking(move || index.save(&path))
            .await
            .map_err(|e| SearchError::Other(format!("Join error: {e}")))??;
        Ok(())
    }

    /// Load an index saved with [`SemanticSearch::save`].
    ///
    /// Fails with `DimensionMismatch` when the stored vectors do not match
    /// the embedder's width.
    pub async fn load(embedder: Arc<dyn Embedder>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let index = tokio::task::spawn_blocking(move || HnswIndex::load(&path))
            .await
            .map_err(|e| SearchError::Other(format!("Join error: {e}")))??;
        Self::with_index(embedder, Arc::new(index))
    }
}

fn check_dimension(embedder: &dyn Embedder, index: &HnswIndex) -> Result<()> {
    if embedder.dimension() != index.dimension() {
        return Err(VectorStoreError::DimensionMismatch {
            expected: index.dimension(),
            actual: embedder.dimension(),
        }
        .into());
    }
    Ok(())
}
