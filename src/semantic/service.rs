//! Sync and search over the post corpus.
//!
//! `SemanticService` composes the embedding provider, the ranker and the
//! post store into the two externally visible operations:
//! - `sync_all`: embed every post and persist the vectors
//! - `search`: embed a query and return posts in relevance order
//!
//! Both run to completion within the calling task; the provider and store
//! calls are the only blocking points.

use std::collections::HashMap;
use std::sync::Arc;

use crate::posts::{Post, PostStore};
use crate::semantic::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::semantic::input::embedding_input;
use crate::semantic::ranker::rank;

/// Errors that can occur during semantic operations.
#[derive(Debug, thiserror::Error)]
pub enum SemanticError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("corpus unavailable: {0}")]
    Corpus(#[source] anyhow::Error),
}

/// Outcome of a `sync_all` run. Per-post failures are the difference
/// between the two counts; they never fail the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
}

pub struct SemanticService {
    store: Arc<dyn PostStore>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl SemanticService {
    pub fn new(store: Arc<dyn PostStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    pub fn provider(&self) -> Arc<dyn EmbeddingProvider> {
        self.provider.clone()
    }

    /// Generate and persist an embedding for every post in the corpus.
    ///
    /// Posts are processed in store order. A post that fails to embed or to
    /// write back is logged and skipped; only a failure to read the corpus
    /// itself aborts the run.
    pub fn sync_all(&self) -> Result<SyncReport, SemanticError> {
        let posts = self.store.list_all().map_err(SemanticError::Corpus)?;
        log::info!("syncing embeddings for {} posts", posts.len());

        let attempted = posts.len();
        let mut succeeded = 0;

        for post in posts {
            let text = embedding_input(&post.title, &post.content, post.author.as_deref());

            match self.provider.embed(&text) {
                Ok(embedding) => match self.store.update_embedding(post.id, &embedding) {
                    Ok(()) => {
                        succeeded += 1;
                        log::info!("updated embedding for post: {}", post.title);
                    }
                    Err(err) => {
                        log::error!("failed to store embedding for post {}: {err}", post.id);
                    }
                },
                Err(err) => {
                    log::error!("failed to embed post {}: {err}", post.id);
                }
            }
        }

        Ok(SyncReport {
            attempted,
            succeeded,
        })
    }

    /// Search the corpus.
    ///
    /// An empty or absent query returns every post newest-first with no
    /// embedding call. Otherwise the query is embedded, posts without a
    /// usable stored embedding are dropped, and the rest come back in
    /// similarity order. Any provider or corpus failure fails the whole
    /// call; there are no partial results.
    pub fn search(&self, query: Option<&str>) -> Result<Vec<Post>, SemanticError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());

        let Some(query) = query else {
            let mut posts = self.store.list_all().map_err(SemanticError::Corpus)?;
            // newest first; id breaks created_at ties so the order is total
            posts.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then(b.id.cmp(&a.id))
            });
            return Ok(posts);
        };

        let query_embedding = self.provider.embed(query)?;

        let posts = self.store.list_all().map_err(SemanticError::Corpus)?;

        let candidates: Vec<(u64, Vec<f32>)> = posts
            .iter()
            .filter_map(|post| {
                let raw = post.embedding.as_deref()?;
                match serde_json::from_str::<Vec<f32>>(raw) {
                    Ok(embedding) => Some((post.id, embedding)),
                    Err(err) => {
                        log::warn!("post {}: unreadable stored embedding: {err}", post.id);
                        None
                    }
                }
            })
            .collect();

        let order = rank(&query_embedding, &candidates);

        let mut by_id: HashMap<u64, Post> = posts.into_iter().map(|p| (p.id, p)).collect();

        Ok(order.into_iter().filter_map(|id| by_id.remove(&id)).collect())
    }
}
