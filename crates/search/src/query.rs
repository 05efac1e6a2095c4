use crate::error::Result;
use semindex_vector_store::{DocId, Document, HnswIndex, VectorStoreError};
use std::sync::Arc;

/// One ranked result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: DocId,
    pub document: Arc<Document>,
    /// Higher is better (cosine similarity, dot product, or negated L2)
    pub score: f32,
    /// Lower is better; the value results are ordered by
    pub distance: f32,
}

/// Graph search followed by an exact re-rank against the stored vectors.
#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<HnswIndex>,
}

impl QueryEngine {
    pub fn new(index: Arc<HnswIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<HnswIndex> {
        &self.index
    }

    /// Top `k` live documents for `query`, nearest first, ties by ascending id.
    ///
    /// `ef` defaults to the index's `ef_search`. The graph is asked for
    /// `max(k, ef)` candidates, which are then scored exactly. Fewer than `k`
    /// hits come back only when fewer than `k` live documents exist.
    pub fn search(&self, query: &[f32], k: usize, ef: Option<usize>) -> Result<Vec<SearchHit>> {
        let ef = ef.unwrap_or(self.index.config().ef_search);

        // Pins ids until the hits are resolved.
        let reader = self.index.reader();
        reader.check_dimension(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = reader.knn_search(query, k.max(ef), ef)?;
        let metric = reader.metric();

        let mut hits = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let record = match reader.get(candidate.id) {
                Ok(record) => record,
                // Deleted between traversal and lookup
                Err(VectorStoreError::NotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            };
            let distance = metric.distance(query, &record.vector);
            hits.push(SearchHit {
                id: record.id,
                document: record.document,
                score: metric.score(distance),
                distance,
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);

        log::debug!(
            "Query: k={k}, ef={ef}, {} candidates, {} hits",
            candidates.len(),
            hits.len()
        );

        Ok(hits)
    }
}
