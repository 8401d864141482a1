//! Integration tests for the semantic search module.
//!
//! These tests require model download and are marked #[ignore] by default.
//! Run with: cargo test -- --ignored

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::posts::{BackendCsv, PostCreate, PostStore};
use crate::semantic::{EmbeddingProvider, FastembedProvider, SemanticService};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir() -> std::path::PathBuf {
    let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "blogd-semantic-integration-{}-{}",
        std::process::id(),
        counter
    ));
    std::fs::create_dir_all(&path).unwrap();
    path
}

/// Test the full embed → persist → search flow against the real model.
#[test]
#[ignore = "requires model download (~23MB)"]
fn test_sync_and_search_flow() {
    let test_dir = test_dir();
    let csv_path = test_dir.join("posts.csv");

    let store: Arc<dyn PostStore> =
        Arc::new(BackendCsv::load(csv_path.to_str().unwrap()).unwrap());

    let posts = [
        ("Machine Learning Tutorial", "An introduction to ML algorithms and neural networks"),
        ("Rust Programming Guide", "Learn the Rust programming language with examples"),
        ("Deep Learning with Python", "Build neural networks using TensorFlow and Keras"),
        ("Web Development Basics", "HTML, CSS, and JavaScript fundamentals"),
    ];

    for (title, content) in posts {
        store
            .create(PostCreate {
                title: title.to_string(),
                content: content.to_string(),
                author: Some("tester".to_string()),
                slug: None,
            })
            .unwrap();
    }

    let provider: Arc<dyn EmbeddingProvider> = Arc::new(FastembedProvider::new(
        vec!["all-MiniLM-L6-v2".to_string()],
        test_dir.clone(),
    ));

    let service = SemanticService::new(store.clone(), provider);

    let report = service.sync_all().unwrap();
    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 4);

    for post in store.list_all().unwrap() {
        let raw = post.embedding.expect("post should be embedded");
        let parsed: Vec<f32> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 384);
    }

    // semantically close query should surface the ML posts first
    let results = service
        .search(Some("artificial intelligence machine learning"))
        .unwrap();
    assert_eq!(results.len(), 4);

    let first = &results[0];
    assert!(
        first.title.contains("Learning"),
        "expected an ML-related post first, got '{}'",
        first.title
    );

    let _ = std::fs::remove_dir_all(&test_dir);
}

/// Similar texts should land closer together than unrelated ones.
#[test]
#[ignore = "requires model download (~23MB)"]
fn test_semantic_similarity() {
    use crate::semantic::cosine_similarity;

    let test_dir = test_dir();

    let provider = FastembedProvider::new(vec!["all-MiniLM-L6-v2".to_string()], test_dir.clone());

    let text1 = "Introduction to machine learning and AI";
    let text2 = "Getting started with artificial intelligence and ML";
    let text3 = "Best recipes for chocolate cake baking";

    let emb1 = provider.embed(text1).unwrap();
    let emb2 = provider.embed(text2).unwrap();
    let emb3 = provider.embed(text3).unwrap();

    let related = cosine_similarity(&emb1, &emb2).unwrap();
    let unrelated = cosine_similarity(&emb1, &emb3).unwrap();

    assert!(
        related > unrelated,
        "related={related}, unrelated={unrelated}"
    );

    let _ = std::fs::remove_dir_all(&test_dir);
}
