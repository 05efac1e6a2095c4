//! # Semindex Vector Store
//!
//! Approximate nearest-neighbour index for embedding vectors with opaque
//! document payloads.
//!
//! ## Features
//!
//! - **HNSW graph** (Hierarchical Navigable Small World) for sub-linear k-NN search
//! - **Cosine, dot-product and L2** distance, fixed per index
//! - **Tombstone deletes** with explicit compaction and id remapping
//! - **Concurrent reads** while a single writer inserts
//! - **Checksummed binary persistence** with atomic replace on save
//! - **Pluggable embedders** behind an async trait, plus a deterministic stub
//!
//! ## Architecture
//!
//! ```text
//! (vector, Document)
//!     │
//!     ├──> VectorStore
//!     │      └─> dense DocId slots, tombstones
//!     │
//!     ├──> HnswIndex
//!     │      ├─> layered neighbour graph
//!     │      └─> knn_search / delete / compact
//!     │
//!     └──> Persistence
//!            └─> SIDX binary + SHA-256 trailer
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use semindex_vector_store::{HnswIndex, IndexConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let index = HnswIndex::new(3, IndexConfig::default())?;
//!
//!     index.insert(vec![1.0, 0.0, 0.0], "first".into())?;
//!     index.insert(vec![0.0, 1.0, 0.0], "second".into())?;
//!
//!     for hit in index.knn_search(&[0.9, 0.1, 0.0], 1, 50)? {
//!         let record = index.get(hit.id)?;
//!         println!("{}: {:.3}", hit.id, index.metric().score(hit.distance));
//!         println!("{:?}", record.document.as_text());
//!     }
//!
//!     index.save("index.sidx")?;
//!     Ok(())
//! }
//! ```

mod config;
mod embeddings;
mod error;
mod hnsw;
mod metric;
mod persist;
mod store;
mod types;

pub use config::{
    IndexConfig, DEFAULT_COMPACTION_THRESHOLD, DEFAULT_EF_CONSTRUCTION, DEFAULT_EF_SEARCH,
    DEFAULT_M, MAX_EF, MAX_LEVEL, MAX_M,
};
pub use embeddings::{Embedder, StubEmbedder, DEFAULT_STUB_DIMENSION};
pub use error::{Result, VectorStoreError};
pub use hnsw::{EntryPoint, HnswIndex, IndexReader, IndexStats};
pub use metric::DistanceMetric;
pub use store::{Remap, StoredRecord, VectorStore};
pub use types::{DocId, Document, Neighbor};
