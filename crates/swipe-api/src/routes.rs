use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Serialize;
use swipe_core::db::{CursorStore, Database, LibSqlListingStore, ListingCounts};
use swipe_core::feed::ODataFeedClient;
use swipe_core::sync::{read_cursor, ReplicationReport, SweepReport};
use swipe_core::Cursor;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, Caller, TriggerAuthority};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::jobs::{JobMetricsSnapshot, JobRunner};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    authority: Arc<TriggerAuthority>,
    jobs: Arc<JobRunner>,
}

impl AppState {
    /// Open the store and feed client described by `config`.
    pub async fn open(config: Arc<AppConfig>) -> swipe_core::Result<Self> {
        let database = Database::open_with(&config.settings.store).await?;
        let store = Arc::new(LibSqlListingStore::new(Arc::new(database)));
        let feed = Arc::new(ODataFeedClient::new(&config.settings.feed)?);
        Ok(Self::from_parts(config, feed, store))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        feed: Arc<ODataFeedClient>,
        store: Arc<LibSqlListingStore>,
    ) -> Self {
        Self {
            authority: Arc::new(TriggerAuthority::new(config.trigger_token.clone())),
            jobs: Arc::new(JobRunner::new(feed, store, config.settings.replication)),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/jobs/replicate", post(trigger_replicate))
        .route("/jobs/reconcile", post(trigger_reconcile))
        .route("/cursor", get(cursor_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    jobs: JobMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let jobs = state.jobs.metrics_snapshot();
    Json(HealthResponse {
        status: if jobs.is_degraded() { "degraded" } else { "ok" },
        timestamp: Utc::now().timestamp(),
        jobs,
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let caller = state.authority.resolve(token)?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

async fn trigger_replicate(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ReplicationReport>, AppError> {
    tracing::info!(endpoint = "replicate", caller = caller.name, "Replication triggered");
    let report = state.jobs.replicate().await?;
    Ok(Json(report))
}

async fn trigger_reconcile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<SweepReport>, AppError> {
    tracing::info!(endpoint = "reconcile", caller = caller.name, "Reconciliation triggered");
    let report = state.jobs.reconcile().await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct CursorResponse {
    cursor: Cursor,
    /// Whether a checkpoint or stored listing backs the cursor.
    persisted: bool,
    listings: ListingCounts,
}

async fn cursor_status(State(state): State<AppState>) -> Result<Json<CursorResponse>, AppError> {
    let store = state.jobs.store().as_ref();
    let persisted = store.load_cursor().await.is_ok_and(|cursor| cursor.is_some());
    let cursor = read_cursor(store).await;
    let listings = store.listing_counts().await?;
    Ok(Json(CursorResponse {
        cursor,
        persisted,
        listings,
    }))
}
