use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::cli::ServeArgs;
use crate::database::ProfileDatabase;
use crate::matching::{AssignConfig, AssignmentEngine};
use crate::parsing::query::parse_query_text;

/// Largest accepted request body
pub const MAX_REQUEST_BODY_SIZE: usize = 16 * 1024 * 1024; // 16MB

/// Requests are cut off after this long
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Concurrent requests served before callers queue
pub const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Shared application state
pub struct AppState {
    pub database: ProfileDatabase,
    pub config: AssignConfig,
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub details: Option<String>,
}

/// Database summary returned by `GET /api/database`
#[derive(Serialize)]
pub struct DatabaseInfo {
    pub scheme: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub loci: usize,
    pub references: usize,
    pub hiercc_levels: Vec<String>,
    pub hiercc_thresholds: Vec<u32>,
}

fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message,
            error_type: error_type.to_string(),
            details: None,
        }),
    )
        .into_response()
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the database cannot be loaded, the tokio runtime
/// cannot be created, or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let database = ProfileDatabase::load(&args.database)?;
    info!(
        "Loaded {} {} with {} references",
        database.metadata().scheme,
        database.metadata().version,
        database.len()
    );
    let state = Arc::new(AppState {
        database,
        config: args.search.to_config(),
    });

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(state, &args.address, args.port).await })
}

/// Create the application router with its routes and middleware.
///
/// Rate limiting needs the peer address and is added by the server itself.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/assign", post(assign_handler))
        .route("/api/database", get(database_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                ))
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE)),
        )
}

async fn run_server(state: Arc<AppState>, address: &str, port: u16) -> anyhow::Result<()> {
    // 20 requests per second per IP, bursts of 100
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(20)
        .burst_size(100)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?;

    let app = create_router(state).layer(GovernorLayer {
        config: Arc::new(governor_conf),
    });

    let addr = format!("{address}:{port}");
    println!("Starting hiercc-assign server at http://{addr}");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Assign one query record or an array of them.
///
/// A single object yields a single envelope; an array (or several JSON
/// Lines) yields an array of envelopes in input order.
async fn assign_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let Ok(text) = std::str::from_utf8(&body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Request body is not valid UTF-8".to_string(),
        );
    };

    let entries = match parse_query_text(text) {
        Ok(entries) => entries,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid_request", e.to_string());
        }
    };
    let batch = text.trim_start().starts_with('[') || entries.len() > 1;

    let worker_state = Arc::clone(&state);
    let outcomes = tokio::task::spawn_blocking(move || {
        let engine =
            AssignmentEngine::with_config(&worker_state.database, worker_state.config.clone());
        engine.assign_entries(&entries)
    })
    .await;

    match outcomes {
        Ok(outcomes) if batch => Json(outcomes).into_response(),
        Ok(mut outcomes) => match outcomes.pop() {
            Some(outcome) => Json(outcome).into_response(),
            None => error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "No query records".to_string(),
            ),
        },
        Err(e) => {
            tracing::error!("Assignment task failed: {e}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Assignment failed".to_string(),
            )
        }
    }
}

async fn database_handler(State(state): State<Arc<AppState>>) -> Json<DatabaseInfo> {
    let metadata = state.database.metadata();
    Json(DatabaseInfo {
        scheme: metadata.scheme.clone(),
        version: metadata.version.clone(),
        created_at: metadata.created_at,
        loci: metadata.locus_count(),
        references: metadata.reference_count,
        hiercc_levels: metadata.hiercc_labels(),
        hiercc_thresholds: metadata.hiercc_thresholds.clone(),
    })
}

async fn health_handler() -> &'static str {
    "ok"
}
