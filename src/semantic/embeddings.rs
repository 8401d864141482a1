//! Embedding model wrapper for fastembed.
//!
//! Provides a high-level interface for generating embeddings:
//! - Lazy model loading with configurable cache directory
//! - Ordered fallback over a list of candidate models
//! - A trait seam so the provider can be substituted in tests

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// Anything that can turn text into a fixed-dimensionality vector.
///
/// The daemon injects a [`FastembedProvider`]; tests inject stubs. All
/// vectors produced by one provider instance share the same dimensionality.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

struct LoadedModel {
    model: TextEmbedding,
    name: String,
    dimensions: usize,
}

/// Embedding provider backed by fastembed's TextEmbedding.
///
/// The model is loaded once, on the first `embed` call, and reused for the
/// lifetime of the provider. Candidate models are attempted in order; the
/// first that initializes wins, and only if every candidate fails does
/// initialization error out.
pub struct FastembedProvider {
    candidates: Vec<String>,
    cache_dir: PathBuf,
    /// Lazily-initialized model. Uses Mutex<Option<_>> instead of OnceLock
    /// because get_or_try_init is unstable. The Mutex also covers embed(),
    /// which needs &mut TextEmbedding.
    state: Mutex<Option<LoadedModel>>,
}

impl FastembedProvider {
    /// Create a provider that will try `candidates` in order on first use.
    ///
    /// Model files are downloaded to the `models/` subdirectory of
    /// `cache_dir` when not already present.
    pub fn new(candidates: Vec<String>, cache_dir: PathBuf) -> Self {
        Self {
            candidates,
            cache_dir,
            state: Mutex::new(None),
        }
    }

    /// Dimensionality of the loaded model, or None before first use.
    pub fn dimensions(&self) -> Option<usize> {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|m| m.dimensions))
    }

    /// Name of the model that actually loaded, or None before first use.
    pub fn model_name(&self) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|m| m.name.clone()))
    }

    fn load_model(&self, name: &str) -> Result<LoadedModel, EmbeddingError> {
        let model_enum = parse_model_name(name)?;

        let models_dir = self.cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = probe_dimensions(&mut model)?;

        Ok(LoadedModel {
            model,
            name: name.to_string(),
            dimensions,
        })
    }

    /// Walk the candidate list until one model initializes.
    fn init_cascade(&self) -> Result<LoadedModel, EmbeddingError> {
        if self.candidates.is_empty() {
            return Err(EmbeddingError::InitFailed(
                "no embedding models configured".to_string(),
            ));
        }

        let mut failures = Vec::new();
        for name in &self.candidates {
            match self.load_model(name) {
                Ok(loaded) => {
                    log::info!(
                        "loaded embedding model '{}' ({} dimensions)",
                        loaded.name,
                        loaded.dimensions
                    );
                    return Ok(loaded);
                }
                Err(err) => {
                    log::warn!("embedding model '{name}' failed to load: {err}");
                    failures.push(format!("{name}: {err}"));
                }
            }
        }

        Err(EmbeddingError::InitFailed(format!(
            "all candidate models failed [{}]",
            failures.join("; ")
        )))
    }
}

impl EmbeddingProvider for FastembedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut guard = self.state.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        if guard.is_none() {
            *guard = Some(self.init_cascade()?);
        }

        let loaded = guard
            .as_mut()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("model not loaded".to_string()))?;

        let embeddings = loaded
            .model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }
}

/// Parse model name string to fastembed enum.
fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l6-v2-q" | "allminiml6v2q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
        "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-small-en-v1.5-q" | "bgesmallenv15q" => Ok(fastembed::EmbeddingModel::BGESmallENV15Q),
        "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-base-en-v1.5-q" | "bgebaseenv15q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
        "bge-large-en-v1.5" | "bgelargeenv15" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "bge-large-en-v1.5-q" | "bgelargeenv15q" => Ok(fastembed::EmbeddingModel::BGELargeENV15Q),
        _ => Err(EmbeddingError::InvalidModel(format!(
            "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5 (add -q suffix for quantized)",
            name
        ))),
    }
}

/// Probe the model to determine embedding dimensions.
fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
    let test_embeddings = model
        .embed(vec!["test"], None)
        .map_err(|e| EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e)))?;

    test_embeddings
        .first()
        .map(|v| v.len())
        .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_name() {
        let result = parse_model_name("nonexistent-model");
        assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
    }

    #[test]
    fn test_model_name_case_insensitive() {
        assert!(parse_model_name("All-MiniLM-L6-V2").is_ok());
        assert!(parse_model_name("BGE-BASE-EN-V1.5").is_ok());
    }

    #[test]
    fn test_cascade_all_invalid_names() {
        let temp_dir = std::env::temp_dir().join("blogd-embed-cascade");
        let provider = FastembedProvider::new(
            vec!["not-a-model".to_string(), "also-not-a-model".to_string()],
            temp_dir,
        );

        let err = provider.embed("hello").unwrap_err();
        match err {
            EmbeddingError::InitFailed(msg) => {
                // every candidate shows up in the terminal error
                assert!(msg.contains("not-a-model"));
                assert!(msg.contains("also-not-a-model"));
            }
            other => panic!("expected InitFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_candidate_list() {
        let temp_dir = std::env::temp_dir().join("blogd-embed-empty");
        let provider = FastembedProvider::new(vec![], temp_dir);

        let err = provider.embed("hello").unwrap_err();
        assert!(matches!(err, EmbeddingError::InitFailed(_)));
    }

    // Integration tests require model download - run with --ignored
    #[test]
    #[ignore = "requires model download"]
    fn test_embedding_generation() {
        let temp_dir = std::env::temp_dir().join("blogd-embed-test-gen");
        let provider =
            FastembedProvider::new(vec!["all-MiniLM-L6-v2".to_string()], temp_dir.clone());

        let embedding = provider.embed("Hello, world!").unwrap();
        assert_eq!(embedding.len(), 384); // MiniLM produces 384-dim embeddings
        assert_eq!(provider.dimensions(), Some(384));
        assert_eq!(provider.model_name().as_deref(), Some("all-MiniLM-L6-v2"));

        // Check that values are normalized (L2 norm ~= 1)
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_cascade_falls_through_to_valid_model() {
        let temp_dir = std::env::temp_dir().join("blogd-embed-test-cascade");
        let provider = FastembedProvider::new(
            vec!["bogus-model".to_string(), "all-MiniLM-L6-v2".to_string()],
            temp_dir.clone(),
        );

        let embedding = provider.embed("fallback test").unwrap();
        assert_eq!(embedding.len(), 384);
        assert_eq!(provider.model_name().as_deref(), Some("all-MiniLM-L6-v2"));

        let _ = std::fs::remove_dir_all(&temp_dir);
    }
}
