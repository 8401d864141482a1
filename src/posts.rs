use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    hash::Hash,
    io::ErrorKind,
    sync::{Arc, RwLock},
    time::Instant,
};

#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,

    pub slug: String,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,

    /// Stored embedding, serialized as a JSON array of floats. Opaque here;
    /// only the search path parses it. Absent until a sync run embeds the
    /// post, and stale after an edit unless re-embedding is enabled.
    pub embedding: Option<String>,
}

impl Hash for Post {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Post {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// What callers of the search/CRUD API receive. The raw embedding and any
/// similarity score never leave the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            slug: post.slug,
            content: post.content,
            author: post.author,
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PostCreate {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Derived from the title when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl PostUpdate {
    /// True when the update touches a field that feeds the embedding input.
    pub fn touches_text(&self) -> bool {
        self.title.is_some() || self.content.is_some() || self.author.is_some()
    }
}

/// The corpus store. Every operation is a full-record read or an independent
/// per-post write; there are no multi-post transactions.
pub trait PostStore: Send + Sync {
    fn list_all(&self) -> anyhow::Result<Vec<Post>>;
    fn find_by_id(&self, id: u64) -> anyhow::Result<Option<Post>>;
    fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<Post>>;
    fn create(&self, post: PostCreate) -> anyhow::Result<Post>;
    fn update(&self, id: u64, update: PostUpdate) -> anyhow::Result<Option<Post>>;
    fn delete(&self, id: u64) -> anyhow::Result<Option<bool>>;
    fn update_embedding(&self, id: u64, embedding: &[f32]) -> anyhow::Result<()>;
    fn total(&self) -> anyhow::Result<usize>;
}

/// Turn a title into a url-safe slug.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

#[derive(Debug, Clone, Default)]
pub struct BackendCsv {
    list: Arc<RwLock<Vec<Post>>>,
    path: String,
}

const CSV_HEADERS: [&str; 7] = [
    "id",
    "slug",
    "title",
    "content",
    "author",
    "created_at",
    "embedding",
];

impl BackendCsv {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new database at {path}");
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;
        let iter = csv_reader.records();

        let mut posts = vec![];
        for record in iter {
            let record = record?;
            let id = record
                .get(0)
                .ok_or(anyhow!("couldnt get record id"))?
                .parse::<u64>()?;
            let slug = record
                .get(1)
                .ok_or(anyhow!("couldnt get record slug"))?
                .to_string();
            let title = record
                .get(2)
                .ok_or(anyhow!("couldnt get record title"))?
                .to_string();
            let content = record
                .get(3)
                .ok_or(anyhow!("couldnt get record content"))?
                .to_string();
            let author = record
                .get(4)
                .ok_or(anyhow!("couldnt get record author"))?
                .to_string();
            let created_at = record
                .get(5)
                .ok_or(anyhow!("couldnt get record created_at"))?
                .parse::<DateTime<Utc>>()?;
            let embedding = record
                .get(6)
                .ok_or(anyhow!("couldnt get record embedding"))?
                .to_string();

            let post = Post {
                id,
                slug,
                title,
                content,
                author: if author.is_empty() {
                    None
                } else {
                    Some(author)
                },
                created_at,
                embedding: if embedding.is_empty() {
                    None
                } else {
                    Some(embedding)
                },
            };

            posts.push(post);
        }

        log::debug!(
            "took {}ms to read csv",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        let mgr = BackendCsv {
            list: Arc::new(RwLock::new(posts)),
            path: path.to_string(),
        };

        Ok(mgr)
    }

    fn save(&self) -> anyhow::Result<()> {
        let posts = self.list.write().unwrap();

        let temp_path = format!("{}-tmp", &self.path);
        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(CSV_HEADERS)?;
        for post in posts.iter() {
            csv_wrt.write_record([
                &post.id.to_string(),
                &post.slug,
                &post.title,
                &post.content,
                &post.author.clone().unwrap_or_default(),
                &post.created_at.to_rfc3339(),
                &post.embedding.clone().unwrap_or_default(),
            ])?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }
}

impl PostStore for BackendCsv {
    fn list_all(&self) -> anyhow::Result<Vec<Post>> {
        Ok(self.list.read().unwrap().clone())
    }

    fn find_by_id(&self, id: u64) -> anyhow::Result<Option<Post>> {
        Ok(self
            .list
            .read()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<Post>> {
        Ok(self
            .list
            .read()
            .unwrap()
            .iter()
            .find(|p| p.slug == slug)
            .cloned())
    }

    fn create(&self, post_create: PostCreate) -> anyhow::Result<Post> {
        let id = if let Some(last_post) = self.list.read().unwrap().last() {
            last_post.id + 1
        } else {
            1
        };

        let slug = match post_create.slug {
            Some(slug) => slug,
            None => slugify(&post_create.title),
        };

        let post = Post {
            id,
            slug,
            title: post_create.title,
            content: post_create.content,
            author: post_create.author,
            created_at: Utc::now(),
            embedding: None,
        };

        self.list.write().unwrap().push(post.clone());

        self.save()?;

        Ok(post)
    }

    fn update(&self, id: u64, post_update: PostUpdate) -> anyhow::Result<Option<Post>> {
        let mut posts = self.list.write().unwrap();

        let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(title) = post_update.title {
            post.title = title;
        }
        if let Some(content) = post_update.content {
            post.content = content;
        }
        if let Some(author) = post_update.author {
            post.author = if author.is_empty() {
                None
            } else {
                Some(author)
            };
        }
        if let Some(slug) = post_update.slug {
            post.slug = slug;
        }

        let result = post.clone();
        drop(posts);

        self.save()?;

        Ok(Some(result))
    }

    fn delete(&self, id: u64) -> anyhow::Result<Option<bool>> {
        let mut posts = self.list.write().unwrap();
        let result = posts.iter().position(|p| p.id == id).map(|idx| {
            posts.remove(idx);
            true
        });

        drop(posts);

        if result.is_some() {
            self.save()?;
        }

        Ok(result)
    }

    fn update_embedding(&self, id: u64, embedding: &[f32]) -> anyhow::Result<()> {
        let mut posts = self.list.write().unwrap();

        let post = posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow!("post with id {} not found", id))?;

        post.embedding = Some(serde_json::to_string(embedding)?);

        drop(posts);

        self.save()
    }

    fn total(&self) -> anyhow::Result<usize> {
        Ok(self.list.read().unwrap().len())
    }
}
