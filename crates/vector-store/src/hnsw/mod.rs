//! Hierarchical Navigable Small World graph.
//!
//! ```text
//! layer 2   E ───────────────── F
//!           │                   │
//! layer 1   E ──── B ────── D ─ F
//!           │      │        │   │
//! layer 0   E ─ A ─ B ─ C ─ D ─ F ─ G ─ ...
//! ```
//!
//! Every node lives on layer 0 and on each layer up to its randomly drawn
//! level. A query starts at the entry point (the node with the highest level),
//! walks greedily down the sparse upper layers and finishes with a beam search
//! on layer 0.
//!
//! Deleted nodes are tombstoned: they keep routing until [`HnswIndex::compact`]
//! removes them.

mod compaction;
mod graph;
mod index;
mod node;

pub use index::{EntryPoint, HnswIndex, IndexReader, IndexStats};

pub(crate) use index::IndexState;
pub(crate) use node::GraphNode;
