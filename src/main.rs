//! Socios Club Backend
//!
//! A REST backend for the club membership rosters: spreadsheet import,
//! member lifecycle over the 2025/2026 lists, and MailChimp audience sync.

mod api;
mod config;
mod errors;
mod mailchimp;
mod models;
mod service;
mod sheet;
mod store;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use mailchimp::MailchimpClient;
use service::MemberService;

/// Largest accepted spreadsheet upload.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub members: Arc<MemberService>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Socios Club Backend");
    tracing::info!("Storage backend: {}", config.storage.kind());
    tracing::info!("Bind address: {}", config.bind_addr);

    // Open the selected storage backend
    let store = store::connect(&config.storage).await?;

    // MailChimp is optional; without it 2026 writes simply skip the sync
    let audience = match &config.mailchimp {
        Some(mailchimp) => Some(MailchimpClient::from_config(mailchimp)?),
        None => {
            tracing::warn!(
                "MailChimp not configured (MAILCHIMP_API_KEY, MAILCHIMP_SERVER_PREFIX, MAILCHIMP_AUDIENCE_ID). Audience sync is disabled."
            );
            None
        }
    };

    let members = Arc::new(MemberService::new(store, audience));

    // Create application state
    let state = AppState {
        members,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Rosters
        .route("/database/members-2025", get(api::list_members_2025))
        .route("/database/members-2026", get(api::list_members_2026))
        .route("/database/search-member", post(api::search_member))
        .route("/database/add-member", post(api::add_member))
        .route("/database/transfer-member", post(api::transfer_member))
        // Spreadsheets
        .route("/database/import-excel", post(api::import_excel))
        .route("/database/export-2025", get(api::export_members_2025))
        .route("/database/export-2026", get(api::export_members_2026))
        .route("/debug-excel", post(api::debug_excel))
        // Status
        .route("/database/status", get(api::database_status))
        .route("/mailchimp/status", get(api::mailchimp_status));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
