//! Tracking API Server
//!
//! HTTP surface for creating links, following tracking links and reporting
//! precise locations, plus the token-guarded dashboard endpoints.

use crate::adapters::inbound::client_ip::extract_client_ip;
use crate::adapters::inbound::visit_page::{self, VisitResponse};
use crate::application::{NewLink, TrackingError, TrackingService, Visit};
use crate::domain::entities::{AccessTrace, Link, PreciseLocation};
use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Header carrying the access id on tracking responses.
pub const ACCESS_ID_HEADER: &str = "x-access-id";
/// Alternative to `Authorization: Bearer` for dashboard requests.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Link creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    #[serde(default)]
    pub target_url: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub custom_mask: Option<String>,
}

/// Link creation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkResponse {
    pub link_id: String,
    pub tracking_link: String,
    pub masked_url: Option<String>,
    pub original_url: String,
}

/// Precise location report from the visitor's browser.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    #[serde(default)]
    pub link_id: Option<String>,
    #[serde(default)]
    pub access_id: Option<String>,
    #[serde(default)]
    pub precise_location: Option<PreciseLocation>,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub links: usize,
}

#[derive(Debug, Serialize)]
pub struct LinksResponse {
    pub links: Vec<Link>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct LinkHistoryResponse {
    pub link: Link,
    pub traces: Vec<AccessTrace>,
}

/// Handler errors, rendered as `{"error": ...}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("missing or invalid admin token")]
    Unauthorized,
    #[error("failed to render response: {0}")]
    Render(#[from] serde_json::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Tracking(TrackingError::InvalidTarget)
            | Self::Tracking(TrackingError::InvalidLocation(_))
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Tracking(TrackingError::LinkNotFound(_))
            | Self::Tracking(TrackingError::AccessNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Tracking(TrackingError::Store(_)) | Self::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<TrackingService>,
    /// Origin used for tracking links; the request's Host when unset
    pub public_url: Option<String>,
    /// Shared secret for dashboard routes; open when unset
    pub admin_token: Option<String>,
}

impl ApiState {
    pub fn new(service: Arc<TrackingService>) -> Self {
        Self {
            service,
            public_url: None,
            admin_token: None,
        }
    }

    pub fn with_public_url(mut self, public_url: Option<String>) -> Self {
        self.public_url = public_url.map(|u| u.trim_end_matches('/').to_string());
        self
    }

    pub fn with_admin_token(mut self, admin_token: Option<String>) -> Self {
        self.admin_token = admin_token.filter(|t| !t.is_empty());
        self
    }

    fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{}", host)
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.admin_token else {
            return true;
        };

        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        let direct = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim);

        bearer == Some(expected.as_str()) || direct == Some(expected.as_str())
    }
}

/// Build the application router.
pub fn router(state: ApiState) -> Router {
    // Only the dashboard reads are guarded; link creation stays open
    let admin = middleware::from_fn_with_state(state.clone(), require_admin);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/links",
            get(list_links_handler)
                .route_layer(admin.clone())
                .post(create_link_handler),
        )
        .route("/api/links/:link_id", get(link_history_handler).route_layer(admin))
        .route("/t/:link_id", get(track_handler))
        .route("/api/update-location", post(update_location_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for the tracking API.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, state: ApiState) -> Self {
        Self { listen_addr, state }
    }

    /// Serve until `shutdown` completes, then drain in-flight requests.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("tracking API listening on {}", self.listen_addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;
        Ok(())
    }
}

async fn require_admin(
    State(state): State<ApiState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.is_authorized(req.headers()) {
        tracing::debug!("rejected dashboard request to {}", req.uri().path());
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

// Handler functions

async fn health_handler(State(state): State<ApiState>) -> Result<Json<HealthResponse>, ApiError> {
    let links = state.service.link_count().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        links,
    }))
}

async fn create_link_handler(
    State(state): State<ApiState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<CreateLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created_by = extract_client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let base_url = state.base_url(&headers);

    let link = state
        .service
        .create_link(
            NewLink {
                target_url: req.target_url,
                template: req.template,
                custom_mask: req.custom_mask,
            },
            &created_by,
            &base_url,
        )
        .await?;

    let response = CreateLinkResponse {
        tracking_link: format!("{}/t/{}", base_url, link.id),
        link_id: link.id,
        masked_url: link.masked_url,
        original_url: link.target_url,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// How a tracking-link response is shaped, picked from `Accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitReply {
    /// `{linkId, accessId, targetUrl}` for scripted clients
    Json,
    /// Location page that reports the device position, then redirects
    Page,
    /// Bare `302` to the target
    Redirect,
}

impl VisitReply {
    fn negotiate(headers: &HeaderMap) -> Self {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if accept.contains("application/json") {
            Self::Json
        } else if accept.contains("text/html") {
            Self::Page
        } else {
            Self::Redirect
        }
    }
}

async fn track_handler(
    State(state): State<ApiState>,
    Path(link_id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let header_text = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let visit = Visit {
        ip: extract_client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)),
        user_agent: header_text(header::USER_AGENT),
        referer: header_text(header::REFERER),
    };

    let (link, trace) = state.service.record_visit(&link_id, visit).await?;
    tracing::info!(
        "visit on link {} from {} ({})",
        link.id,
        trace.ip,
        trace.ip_info.location
    );

    let access_header = (HeaderName::from_static(ACCESS_ID_HEADER), trace.access_id.clone());
    let reply = VisitResponse {
        link_id: link.id,
        access_id: trace.access_id,
        target_url: link.target_url,
    };

    let response = match VisitReply::negotiate(&headers) {
        VisitReply::Json => ([access_header], Json(reply)).into_response(),
        VisitReply::Page => {
            let page = visit_page::render(&reply)?;
            (
                [access_header, (header::CACHE_CONTROL, "no-store".to_string())],
                Html(page),
            )
                .into_response()
        }
        VisitReply::Redirect => (
            StatusCode::FOUND,
            [(header::LOCATION, reply.target_url), access_header],
        )
            .into_response(),
    };
    Ok(response)
}

async fn update_location_handler(
    State(state): State<ApiState>,
    Json(req): Json<UpdateLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(link_id), Some(access_id), Some(location)) =
        (req.link_id, req.access_id, req.precise_location)
    else {
        return Err(ApiError::BadRequest(
            "linkId, accessId and preciseLocation are required",
        ));
    };

    state
        .service
        .update_location(&link_id, &access_id, location)
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn list_links_handler(State(state): State<ApiState>) -> Result<Json<LinksResponse>, ApiError> {
    let links = state.service.list_links().await?;
    let total = links.len();
    Ok(Json(LinksResponse { links, total }))
}

async fn link_history_handler(
    State(state): State<ApiState>,
    Path(link_id): Path<String>,
) -> Result<Json<LinkHistoryResponse>, ApiError> {
    let (link, traces) = state.service.history(&link_id).await?;
    Ok(Json(LinkHistoryResponse { link, traces }))
}
