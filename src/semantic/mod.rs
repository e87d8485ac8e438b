//! Semantic search infrastructure for question titles.
//!
//! # Architecture
//!
//! - `embeddings`: `Embedder` seam and the fastembed-backed model
//! - `index`: In-memory vector index with cosine distance search
//! - `storage`: Binary file I/O for a persisted collection
//! - `collection`: Named collection inside the index directory

mod collection;
mod embeddings;
mod index;
mod storage;

pub use collection::{Collection, CollectionError, UpsertBatch, VectorStore};
pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use index::QueryHit;
