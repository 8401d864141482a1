//! Semantic search infrastructure for post embeddings.
//!
//! This module provides local semantic search using fastembed-rs for
//! generating embeddings and cosine similarity for ranking.
//!
//! # Architecture
//!
//! - `embeddings`: the embedding provider (fastembed wrapper + trait seam)
//! - `input`: builds the text that gets embedded for a post
//! - `ranker`: cosine similarity and relevance ordering
//! - `service`: high-level sync + search operations over the post store

pub mod embeddings;
mod input;
pub mod ranker;
mod service;

pub use embeddings::{EmbeddingError, EmbeddingProvider, FastembedProvider};
pub use input::embedding_input;
pub use ranker::{cosine_similarity, rank, RankError};
pub use service::{SemanticError, SemanticService, SyncReport};
