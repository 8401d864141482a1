use crate::{
    app::{App, AppError},
    config::Config,
    posts::PostView,
};
use axum::{
    error_handling::HandleErrorLayer,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::signal;
use tower::{timeout::TimeoutLayer, BoxError, ServiceBuilder};

/// Upper bound on any single request. Generous because the first search or
/// sync after startup may download the embedding model.
const REQUEST_TIMEOUT_SECS: u64 = 600;

#[derive(Clone)]
struct SharedState {
    app: Arc<App>,
}

async fn start_app(app: App) {
    let addr = app.config().read().unwrap().listen_addr.clone();
    let app = Arc::new(app);

    let shared_state = Arc::new(SharedState { app });

    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    let router = Router::new()
        .route("/api/posts/search", post(search))
        .route("/api/posts/create", post(create))
        .route("/api/posts/update", post(update))
        .route("/api/posts/delete", post(delete))
        .route("/api/posts/generate_embeddings", post(generate_embeddings))
        .route("/api/posts/total", post(total))
        .route("/api/config", get(get_config))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS))),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    log::info!("listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

pub fn start_daemon(app: App) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async { start_app(app).await });
}

/// A timed-out request is an operation failure, not a hung connection.
async fn handle_middleware_error(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            json!({"error": "request timed out"}).to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": err.to_string()}).to_string(),
        )
    }
}

// Make our own error that wraps `AppError`.
#[derive(Debug)]
struct HttpError(AppError);

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.0 {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({"error": self.0.to_string()}).to_string(),
            ),
            AppError::AlreadyExists(_, _) => (
                StatusCode::CONFLICT,
                json!({"error": self.0.to_string()}).to_string(),
            ),
            AppError::Semantic(_) => {
                log::error!("{self:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": self.0.to_string()}).to_string(),
                )
            }
            AppError::IO(_) => {
                log::error!("{self:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": self.0.to_string()}).to_string(),
                )
            }
            AppError::Other(_) => {
                log::error!("{self:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": self.0.to_string()}).to_string(),
                )
            }
        }
        .into_response()
    }
}

// This enables using `?` on functions that return `Result<_, AppError>` to
// turn them into `Result<_, HttpError>`.
impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Store scans and embedding inference are blocking; run them off the
/// reactor so the timeout layer can still fire.
async fn run_blocking<T, F>(f: F) -> Result<T, HttpError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| HttpError(AppError::Other(anyhow::anyhow!("task failed: {err}"))))?
        .map_err(HttpError)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    /// Query text. Empty or absent returns every post newest-first.
    pub query: Option<String>,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<axum::Json<Vec<PostView>>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    run_blocking(move || app.search(payload.query.as_deref()))
        .await
        .map(Json)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostCreateRequest {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub slug: Option<String>,
}

async fn create(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<PostCreateRequest>,
) -> Result<axum::Json<PostView>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    run_blocking(move || {
        app.create(crate::posts::PostCreate {
            title: payload.title,
            content: payload.content,
            author: payload.author,
            slug: payload.slug,
        })
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostUpdateRequest {
    pub id: u64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub slug: Option<String>,
}

async fn update(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<PostUpdateRequest>,
) -> Result<axum::Json<PostView>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    run_blocking(move || {
        app.update(
            payload.id,
            crate::posts::PostUpdate {
                title: payload.title,
                content: payload.content,
                author: payload.author,
                slug: payload.slug,
            },
        )
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostDeleteRequest {
    pub id: u64,
}

async fn delete(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<PostDeleteRequest>,
) -> Result<axum::Json<()>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    run_blocking(move || app.delete(payload.id)).await.map(Json)
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
}

async fn generate_embeddings(
    State(state): State<Arc<SharedState>>,
) -> Result<axum::Json<SyncResponse>, HttpError> {
    let app = state.app.clone();

    run_blocking(move || {
        let report = app.sync_embeddings()?;
        Ok(SyncResponse {
            success: true,
            message: format!(
                "generated embeddings for {} of {} posts",
                report.succeeded, report.attempted
            ),
        })
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TotalResponse {
    pub total: usize,
}

async fn total(
    State(state): State<Arc<SharedState>>,
) -> Result<axum::Json<TotalResponse>, HttpError> {
    let app = state.app.clone();

    run_blocking(move || app.total().map(|total| TotalResponse { total }))
        .await
        .map(Json)
}

async fn get_config(
    State(state): State<Arc<SharedState>>,
) -> Result<axum::Json<Config>, HttpError> {
    let app = state.app.clone();

    Ok(Json(app.config().read().unwrap().clone()))
}
