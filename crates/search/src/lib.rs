//! Text-level semantic search on top of `semindex-vector-store`.
//!
//! [`QueryEngine`] turns a query vector into ranked hits (graph search plus an
//! exact re-rank); [`SemanticSearch`] adds the embedding step and the
//! index/search/save/load lifecycle.

mod engine;
mod error;
mod query;

pub use engine::{SemanticSearch, DEFAULT_TOP_K};
pub use error::{Result, SearchError};
pub use query::{QueryEngine, SearchHit};
