//! Embeddings and the local knowledge index.
//!
//! # Main types
//!
//! - [`EmbeddingProvider`]: Embedding collaborator; returns `None` instead of failing.
//! - [`LocalEmbedding`]: Hashed bag-of-words embedding, no external API needed.
//! - [`KnowledgeIndex`]: Similarity lookup used by grounding.
//! - [`LocalKnowledgeIndex`]: In-memory index built from text passages or a directory.

/// Embedding provider trait and local implementation.
pub mod embedding;
/// Knowledge index trait and in-memory implementation.
pub mod index;

pub use embedding::{cosine_similarity, EmbeddingProvider, LocalEmbedding};
pub use index::{KnowledgeHit, KnowledgeIndex, LocalKnowledgeIndex};
