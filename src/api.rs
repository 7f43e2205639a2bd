//! HTTP API over [`TwinService`].
//!
//! | Method | Path                                   | Handler                |
//! |--------|----------------------------------------|------------------------|
//! | GET    | `/health`                              | liveness and counters  |
//! | GET    | `/api/researchers`                     | registry listing       |
//! | GET    | `/api/context/{slug}`                  | `GetContext`           |
//! | GET    | `/api/discover?q=&type=`               | `Discover`             |
//! | GET    | `/api/researcher/{slug}/profile`       | profile summary        |
//! | GET    | `/api/researcher/{slug}/papers`        | every publication      |
//! | GET    | `/api/researcher/{slug}/datasets`      | every dataset          |
//! | GET    | `/api/researcher/{slug}/repos`         | every repository       |
//! | POST   | `/chat`                                | answer hand-off        |

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};
use twin_core::{ArtifactKind, DiscoverFilter};

use crate::error::ServiceError;
use crate::service::{
    ChatReply, ContextResponse, DiscoverResponse, ItemList, ProfileSummary, ResearcherSummary,
    TwinService,
};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// `GET /health` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Researchers with a published profile snapshot.
    pub profiles: usize,
    pub chat_enabled: bool,
    /// Durable cache rows per source.
    pub cache_entries: BTreeMap<String, u64>,
}

/// `GET /api/researchers` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResearcherList {
    pub researchers: Vec<ResearcherSummary>,
}

#[derive(Debug, Deserialize)]
struct DiscoverParams {
    q: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// `POST /chat` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub researcher_slug: String,
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Handler error: a [`ServiceError`] rendered with its HTTP status.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::UnknownResearcher(_) => StatusCode::NOT_FOUND,
            ServiceError::AnswerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Answer(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Config(_)
            | ServiceError::Store(_)
            | ServiceError::Core(_)
            | ServiceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
            "internal error".to_owned()
        } else {
            self.0.to_string()
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the router over a shared service.
pub fn router(service: Arc<TwinService>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/researchers", get(handle_researchers))
        .route("/api/context/{slug}", get(handle_context))
        .route("/api/discover", get(handle_discover))
        .route("/api/researcher/{slug}/profile", get(handle_profile))
        .route("/api/researcher/{slug}/papers", get(handle_papers))
        .route("/api/researcher/{slug}/datasets", get(handle_datasets))
        .route("/api/researcher/{slug}/repos", get(handle_repos))
        .route("/chat", post(handle_chat))
        .with_state(service)
}

/// `GET /health`
async fn handle_health(State(service): State<Arc<TwinService>>) -> ApiResult<HealthResponse> {
    let cache_entries = service
        .cache_counts()
        .await?
        .into_iter()
        .map(|(kind, count)| (kind.name().to_owned(), count))
        .collect();
    Ok(Json(HealthResponse {
        status: "ok".to_owned(),
        profiles: service.snapshots().len(),
        chat_enabled: service.chat_enabled(),
        cache_entries,
    }))
}

/// `GET /api/researchers`
async fn handle_researchers(State(service): State<Arc<TwinService>>) -> ApiResult<ResearcherList> {
    Ok(Json(ResearcherList {
        researchers: service.researchers().await?,
    }))
}

/// `GET /api/context/{slug}`
async fn handle_context(
    State(service): State<Arc<TwinService>>,
    Path(slug): Path<String>,
) -> ApiResult<ContextResponse> {
    Ok(Json(service.get_context(&slug).await?))
}

/// `GET /api/discover?q=...&type=...`
async fn handle_discover(
    State(service): State<Arc<TwinService>>,
    Query(params): Query<DiscoverParams>,
) -> ApiResult<DiscoverResponse> {
    let filter: DiscoverFilter = params.kind.parse().map_err(ServiceError::from)?;
    Ok(Json(service.discover(&params.q, filter).await?))
}

/// `GET /api/researcher/{slug}/profile`
async fn handle_profile(
    State(service): State<Arc<TwinService>>,
    Path(slug): Path<String>,
) -> ApiResult<ProfileSummary> {
    Ok(Json(service.profile(&slug).await?))
}

async fn handle_papers(
    State(service): State<Arc<TwinService>>,
    Path(slug): Path<String>,
) -> ApiResult<ItemList> {
    Ok(Json(service.items(&slug, ArtifactKind::Publication).await?))
}

async fn handle_datasets(
    State(service): State<Arc<TwinService>>,
    Path(slug): Path<String>,
) -> ApiResult<ItemList> {
    Ok(Json(service.items(&slug, ArtifactKind::Dataset).await?))
}

async fn handle_repos(
    State(service): State<Arc<TwinService>>,
    Path(slug): Path<String>,
) -> ApiResult<ItemList> {
    Ok(Json(service.items(&slug, ArtifactKind::Repository).await?))
}

/// `POST /chat`
async fn handle_chat(
    State(service): State<Arc<TwinService>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatReply> {
    Ok(Json(
        service.chat(&request.researcher_slug, &request.message).await?,
    ))
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Running API server.
pub struct ApiServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ApiServer {
    /// Bind `addr` (port `0` for auto-assign) and serve in a background task.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Io`] if the listener cannot bind.
    pub async fn start(service: Arc<TwinService>, addr: SocketAddr) -> crate::error::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let app = router(service);

        info!("API listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("API server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        let status = |e: ServiceError| ApiError(e).status();
        assert_eq!(status(ServiceError::InvalidInput("q".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(ServiceError::UnknownResearcher("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ServiceError::AnswerUnavailable("off".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status(ServiceError::Answer("502".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(ServiceError::Config("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
