use async_trait::async_trait;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use semindex_search::{QueryEngine, SearchError, SemanticSearch, DEFAULT_TOP_K};
use semindex_vector_store::{
    DocId, Document, Embedder, HnswIndex, IndexConfig, StubEmbedder, VectorStoreError,
};
use std::sync::Arc;
use tempfile::TempDir;

const CORPUS: &[&str] = &[
    "The cat sat on the mat",
    "Dogs are loyal companions",
    "Rust guarantees memory safety without a garbage collector",
    "Graph search finds approximate nearest neighbours",
    "Bread needs flour, water, salt and yeast",
    "The stock market closed higher today",
    "Transformers produce sentence embeddings",
];

fn stub() -> Arc<dyn Embedder> {
    Arc::new(StubEmbedder::new(64))
}

async fn indexed() -> SemanticSearch {
    let config = IndexConfig::for_speed().with_seed(3);
    let search = SemanticSearch::new(stub(), config).expect("search");
    search
        .index(CORPUS.iter().map(ToString::to_string).collect())
        .await
        .expect("index");
    search
}

#[tokio::test]
async fn exact_text_ranks_first() {
    let _ = env_logger::builder().is_test(true).try_init();
    let search = indexed().await;

    let hits = search.search(CORPUS[3], DEFAULT_TOP_K).await.expect("search");
    assert_eq!(hits.len(), DEFAULT_TOP_K);
    assert_eq!(hits[0].id, 3);
    assert_eq!(hits[0].document.as_text(), Some(CORPUS[3]));
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn blank_query_and_empty_corpus_are_rejected() {
    let search = SemanticSearch::new(stub(), IndexConfig::default()).expect("search");

    assert!(matches!(search.search("   ", 3).await, Err(SearchError::EmptyQuery)));
    assert!(matches!(search.index(Vec::new()).await, Err(SearchError::EmptyDocuments)));

    // Nothing indexed yet: not an error, just no hits.
    assert!(search.search("anything", 3).await.expect("search").is_empty());
}

#[tokio::test]
async fn payloads_are_returned_with_hits() {
    let config = IndexConfig::for_speed().with_seed(4);
    let search = SemanticSearch::new(stub(), config).expect("search");
    let ids = search
        .index_with_payloads(vec![
            ("alpha".to_string(), Document::from_bytes(vec![1, 2, 3])),
            ("beta".to_string(), Document::from_bytes(vec![4, 5])),
        ])
        .await
        .expect("index");
    assert_eq!(ids, vec![0, 1]);

    let hits = search.search_with_ef("beta", 1, 8).await.expect("search");
    assert_eq!(hits[0].document.as_bytes(), &[4, 5]);
}

#[tokio::test]
async fn deleted_documents_disappear_until_compaction_renumbers() {
    let search = indexed().await;
    assert!(search.delete(3).expect("delete"));
    assert_eq!(search.len(), CORPUS.len() - 1);

    let hits = search.search(CORPUS[3], CORPUS.len()).await.expect("search");
    assert_eq!(hits.len(), CORPUS.len() - 1);
    assert!(hits.iter().all(|h| h.id != 3));

    let remap = search.compact().expect("compact");
    assert_eq!(remap.get(3), None);
    assert_eq!(remap.get(4), Some(3));
    assert_eq!(search.stats().tombstoned, 0);

    let hits = search.search(CORPUS[4], 1).await.expect("search");
    assert_eq!(hits[0].id, 3);
    assert_eq!(hits[0].document.as_text(), Some(CORPUS[4]));
}

#[tokio::test]
async fn compact_if_needed_respects_threshold() {
    let search = indexed().await;
    assert!(search.compact_if_needed().expect("compact").is_none());

    search.delete(0).expect("delete");
    search.delete(1).expect("delete");
    let remap = search.compact_if_needed().expect("compact").expect("should compact");
    assert_eq!(remap.removed_count(), 2);
}

#[tokio::test]
async fn unbounded_k_returns_every_live_document() {
    let search = indexed().await;
    search.delete(0).expect("delete");

    let hits = search.search(CORPUS[2], usize::MAX).await.expect("search");
    assert_eq!(hits.len(), CORPUS.len() - 1);
    assert_eq!(hits[0].id, 2);

    let hits = search.search_with_ef(CORPUS[2], 2, usize::MAX).await.expect("search");
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("corpus.sidx");

    let search = indexed().await;
    search.save(&path).await.expect("save");

    let loaded = SemanticSearch::load(stub(), &path).await.expect("load");
    assert_eq!(loaded.len(), CORPUS.len());

    for text in CORPUS {
        let before = search.search(text, 3).await.expect("search");
        let after = loaded.search(text, 3).await.expect("search");
        let before: Vec<DocId> = before.iter().map(|h| h.id).collect();
        let after: Vec<DocId> = after.iter().map(|h| h.id).collect();
        assert_eq!(before, after);
    }
}

#[tokio::test]
async fn load_with_wrong_embedder_dimension_fails() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("corpus.sidx");
    indexed().await.save(&path).await.expect("save");

    let wrong: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(32));
    assert!(matches!(
        SemanticSearch::load(wrong, &path).await,
        Err(SearchError::VectorStoreError(
            VectorStoreError::DimensionMismatch {
                expected: 64,
                actual: 32
            }
        ))
    ));
}

/// Returns one vector fewer than asked for.
struct ShortEmbedder;

#[async_trait]
impl Embedder for ShortEmbedder {
    fn dimension(&self) -> usize {
        4
    }

    fn model_id(&self) -> &str {
        "short"
    }

    async fn embed_batch(&self, texts: &[String]) -> semindex_vector_store::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|_| vec![0.5; 4]).collect())
    }
}

#[tokio::test]
async fn embedder_count_mismatch_leaves_index_empty() {
    let search =
        SemanticSearch::new(Arc::new(ShortEmbedder), IndexConfig::default()).expect("search");
    let err = search
        .index(vec!["a".to_string(), "b".to_string()])
        .await
        .expect_err("count mismatch");
    assert!(matches!(
        err,
        SearchError::VectorStoreError(VectorStoreError::EmbeddingError(_))
    ));
    assert!(search.is_empty());
    assert_eq!(search.stats().total, 0);
}

#[test]
fn stored_vector_is_its_own_nearest_neighbour() {
    let data = vectors(1000, 128, 17);
    let index = HnswIndex::new(128, IndexConfig::default().with_seed(17)).expect("index");
    for v in &data {
        index.insert(v.clone(), Document::default()).expect("insert");
    }
    let engine = QueryEngine::new(Arc::new(index));

    for i in [3usize, 500, 998] {
        let hits = engine.search(&data[i], 5, None).expect("search");
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].id, i as DocId);
        assert!((hits[0].score - 1.0).abs() < 1e-4);
    }
}

fn vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn proptest_results_are_sorted_live_and_complete(
        n in 1usize..60,
        k in 0usize..20,
        ef in 1usize..80,
        deletions in prop::collection::vec(any::<bool>(), 60),
        seed in any::<u64>(),
    ) {
        let data = vectors(n, 6, seed);
        let index = HnswIndex::new(6, IndexConfig::for_speed().with_seed(seed)).unwrap();
        for v in &data {
            index.insert(v.clone(), Document::default()).unwrap();
        }
        for (id, delete) in deletions.iter().take(n).enumerate() {
            if *delete {
                index.delete(id as DocId).unwrap();
            }
        }
        let live = index.live_count();
        let engine = QueryEngine::new(Arc::new(index));

        let hits = engine.search(&data[0], k, Some(ef)).unwrap();
        prop_assert_eq!(hits.len(), k.min(live));
        prop_assert!(hits.iter().all(|h| !deletions[h.id as usize]));
        let ordered = hits.windows(2).all(|w| {
            w[0].distance < w[1].distance || (w[0].distance == w[1].distance && w[0].id < w[1].id)
        });
        prop_assert!(ordered);

        // Same count once the tombstones are gone.
        engine.index().compact().unwrap();
        let hits = engine.search(&data[0], k, Some(ef)).unwrap();
        prop_assert_eq!(hits.len(), k.min(live));
    }
}
