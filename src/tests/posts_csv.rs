use crate::posts::{BackendCsv, PostCreate, PostStore, PostUpdate};

fn fresh_store() -> (BackendCsv, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let csv_path = tmp.path().join("posts.csv");
    let store = BackendCsv::load(csv_path.to_str().unwrap()).unwrap();
    (store, tmp)
}

fn seed(store: &BackendCsv, count: usize) {
    for i in 0..count {
        store
            .create(PostCreate {
                title: format!("Title {i}"),
                content: format!("Content {i}"),
                author: Some(format!("author{i}")),
                slug: Some(format!("title-{i}")),
            })
            .unwrap();
    }
}

// --- save / load roundtrip ---

#[test]
fn save_load_roundtrip_preserves_data() {
    let tmp = tempfile::tempdir().unwrap();
    let csv_path = tmp.path().join("posts.csv");
    let path_str = csv_path.to_str().unwrap();

    {
        let store = BackendCsv::load(path_str).unwrap();
        store
            .create(PostCreate {
                title: "First Post".into(),
                content: "Some body text,\nwith a newline and a \"quote\".".into(),
                author: Some("Ada".into()),
                slug: None,
            })
            .unwrap();
        store
            .create(PostCreate {
                title: "Second".into(),
                content: "short".into(),
                author: None,
                slug: Some("custom-slug".into()),
            })
            .unwrap();
    }

    // reload from disk
    let store = BackendCsv::load(path_str).unwrap();
    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 2);

    let a = &all[0];
    assert_eq!(a.id, 1);
    assert_eq!(a.title, "First Post");
    assert_eq!(a.slug, "first-post");
    assert_eq!(a.content, "Some body text,\nwith a newline and a \"quote\".");
    assert_eq!(a.author.as_deref(), Some("Ada"));
    assert!(a.embedding.is_none());

    let b = &all[1];
    assert_eq!(b.id, 2);
    assert_eq!(b.slug, "custom-slug");
    assert!(b.author.is_none());
}

#[test]
fn load_nonexistent_creates_empty_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let csv_path = tmp.path().join("new.csv");
    let store = BackendCsv::load(csv_path.to_str().unwrap()).unwrap();
    assert_eq!(store.total().unwrap(), 0);
    assert!(csv_path.exists());
}

// --- lookups ---

#[test]
fn find_by_id_and_slug() {
    let (store, _tmp) = fresh_store();
    seed(&store, 3);

    let post = store.find_by_id(2).unwrap().unwrap();
    assert_eq!(post.title, "Title 1");

    let post = store.find_by_slug("title-2").unwrap().unwrap();
    assert_eq!(post.id, 3);

    assert!(store.find_by_id(99).unwrap().is_none());
    assert!(store.find_by_slug("nope").unwrap().is_none());
}

// --- update / delete ---

#[test]
fn update_changes_fields() {
    let (store, _tmp) = fresh_store();
    seed(&store, 1);

    let updated = store
        .update(
            1,
            PostUpdate {
                title: Some("New Title".into()),
                content: None,
                author: Some("".into()),
                slug: None,
            },
        )
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "New Title");
    assert_eq!(updated.content, "Content 0");
    // empty author clears the field
    assert!(updated.author.is_none());
}

#[test]
fn update_missing_returns_none() {
    let (store, _tmp) = fresh_store();
    let result = store.update(42, PostUpdate::default()).unwrap();
    assert!(result.is_none());
}

#[test]
fn delete_removes_post() {
    let (store, _tmp) = fresh_store();
    seed(&store, 2);

    assert_eq!(store.delete(1).unwrap(), Some(true));
    assert_eq!(store.total().unwrap(), 1);
    assert!(store.find_by_id(1).unwrap().is_none());

    assert!(store.delete(1).unwrap().is_none());
}

// --- embeddings ---

#[test]
fn update_embedding_persists_and_roundtrips_exactly() {
    let tmp = tempfile::tempdir().unwrap();
    let csv_path = tmp.path().join("posts.csv");
    let path_str = csv_path.to_str().unwrap();

    let vector = vec![0.25f32, -1.5, 0.000123, 7.0];

    {
        let store = BackendCsv::load(path_str).unwrap();
        seed(&store, 1);
        store.update_embedding(1, &vector).unwrap();
    }

    let store = BackendCsv::load(path_str).unwrap();
    let post = store.find_by_id(1).unwrap().unwrap();
    let raw = post.embedding.expect("embedding should be stored");

    let parsed: Vec<f32> = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, vector);
}

#[test]
fn update_embedding_missing_post_errors() {
    let (store, _tmp) = fresh_store();
    assert!(store.update_embedding(5, &[1.0, 2.0]).is_err());
}

#[test]
fn ids_keep_increasing() {
    let (store, _tmp) = fresh_store();
    seed(&store, 2);
    store.delete(2).unwrap();

    let post = store
        .create(PostCreate {
            title: "Another".into(),
            content: "x".into(),
            author: None,
            slug: None,
        })
        .unwrap();

    // next id derives from the last remaining post
    assert_eq!(post.id, 2);
}
