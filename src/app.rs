use crate::{
    config::Config,
    posts::{self, PostCreate, PostStore, PostUpdate, PostView},
    semantic::{
        embedding_input, EmbeddingProvider, FastembedProvider, SemanticError, SemanticService,
        SyncReport,
    },
};
use std::{
    path::Path,
    sync::{Arc, RwLock},
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("post not found")]
    NotFound,

    #[error("post with slug '{0}' already exists at id {1}")]
    AlreadyExists(String, u64),

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

/// Application facade wiring the post store, the semantic service and the
/// config together. One instance per process, shared across requests.
pub struct App {
    post_store: Arc<dyn PostStore>,
    semantic: SemanticService,
    config: Arc<RwLock<Config>>,
}

impl App {
    /// Build an App over the given data directory: `posts.csv` for the
    /// corpus, `models/` for the embedding model cache.
    pub fn new(config: Arc<RwLock<Config>>, data_dir: &Path) -> anyhow::Result<Self> {
        let csv_path = data_dir.join("posts.csv");
        let post_store: Arc<dyn PostStore> = Arc::new(posts::BackendCsv::load(
            csv_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("data dir path is not valid utf8"))?,
        )?);

        let models = config.read().unwrap().semantic_search.models.clone();
        let provider: Arc<dyn EmbeddingProvider> =
            Arc::new(FastembedProvider::new(models, data_dir.to_path_buf()));

        Ok(Self::new_with(post_store, provider, config))
    }

    /// Wire an App from parts. Tests use this to inject a stub provider.
    pub fn new_with(
        post_store: Arc<dyn PostStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: Arc<RwLock<Config>>,
    ) -> Self {
        let semantic = SemanticService::new(post_store.clone(), provider);

        Self {
            post_store,
            semantic,
            config,
        }
    }

    pub fn config(&self) -> Arc<RwLock<Config>> {
        self.config.clone()
    }

    pub fn create(&self, post_create: PostCreate) -> Result<PostView, AppError> {
        let slug = match &post_create.slug {
            Some(slug) => slug.clone(),
            None => posts::slugify(&post_create.title),
        };

        if let Some(existing) = self.post_store.find_by_slug(&slug)? {
            return Err(AppError::AlreadyExists(slug, existing.id));
        }

        let post = self.post_store.create(PostCreate {
            slug: Some(slug),
            ..post_create
        })?;

        Ok(post.into())
    }

    pub fn update(&self, id: u64, post_update: PostUpdate) -> Result<PostView, AppError> {
        let reembed = post_update.touches_text()
            && self.config.read().unwrap().semantic_search.reembed_on_update;

        let post = self
            .post_store
            .update(id, post_update)?
            .ok_or(AppError::NotFound)?;

        // Stored embeddings go stale on edit by default; re-embedding here is
        // opt-in via config. A failed re-embed keeps the previous vector.
        if reembed {
            let text = embedding_input(&post.title, &post.content, post.author.as_deref());
            match self.semantic.provider().embed(&text) {
                Ok(embedding) => {
                    if let Err(err) = self.post_store.update_embedding(post.id, &embedding) {
                        log::warn!("couldnt persist refreshed embedding for post {id}: {err}");
                    }
                }
                Err(err) => {
                    log::warn!("couldnt re-embed post {id} after update: {err}");
                }
            }
        }

        // re-read so the caller sees the refreshed record
        let post = self.post_store.find_by_id(id)?.ok_or(AppError::NotFound)?;

        Ok(post.into())
    }

    pub fn delete(&self, id: u64) -> Result<(), AppError> {
        match self.post_store.delete(id)? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound),
        }
    }

    pub fn find(&self, id: u64) -> Result<PostView, AppError> {
        let post = self.post_store.find_by_id(id)?.ok_or(AppError::NotFound)?;
        Ok(post.into())
    }

    /// Search the corpus. No query means the reverse-chronological listing.
    pub fn search(&self, query: Option<&str>) -> Result<Vec<PostView>, AppError> {
        let posts = self.semantic.search(query)?;
        Ok(posts.into_iter().map(Into::into).collect())
    }

    /// Run the batch embedding sync over every post.
    pub fn sync_embeddings(&self) -> Result<SyncReport, AppError> {
        Ok(self.semantic.sync_all()?)
    }

    pub fn total(&self) -> Result<usize, AppError> {
        Ok(self.post_store.total()?)
    }
}
