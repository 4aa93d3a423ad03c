//! IdeaBox HTTP Gateway
//!
//! The single entry point of the idea box.
//! Handles:
//! - Public idea submission, listing and detail pages
//! - Moderator sessions, moderation and category management
//! - Attachment downloads
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;
#[cfg(test)]
mod test_support;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use ideabox_common::{
    auth::SessionManager,
    config::AppConfig,
    db::{schema, seed},
    metrics::{self, LATENCY_BUCKETS},
    notify::{self, Notifier},
    services::{CategoryRegistry, IdeaLifecycle, IdeaListing},
    storage::{FileStore, LocalFileStore},
    DbPool, Repository,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub lifecycle: IdeaLifecycle,
    pub listing: IdeaListing,
    pub categories: CategoryRegistry,
    pub sessions: SessionManager,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: DbPool,
        store: Arc<dyn FileStore>,
        notifier: Arc<dyn Notifier>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            repo: Repository::new(db.clone()),
            lifecycle: IdeaLifecycle::new(db.clone(), store, notifier, &config.uploads),
            listing: IdeaListing::new(db.clone(), config.listing.page_size),
            categories: CategoryRegistry::new(db.clone()),
            sessions,
            prometheus: None,
            db,
            config,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting IdeaBox gateway v{}",
        ideabox_common::VERSION
    );

    // Initialize metrics
    let prometheus = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()?;
    metrics::register_metrics();

    // Initialize database connection and schema
    let db = DbPool::connect(&config.database).await?;
    schema::create_tables(db.conn()).await?;

    let report = seed::bootstrap(&db, &config.bootstrap).await?;
    info!(
        moderators_created = report.moderators_created,
        moderators_skipped = report.moderators_skipped,
        categories_created = report.categories_created,
        "Bootstrap complete"
    );

    // Collaborators
    let store: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(&config.uploads.dir).await?);
    let notifier = notify::from_config(&config.mail)?;
    let sessions = SessionManager::from_config(&config.auth);

    // Create app state
    let state = AppState::new(config.clone(), db, store, notifier, sessions)
        .with_prometheus(prometheus);

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// JSON or human-readable logs, filtered by `RUST_LOG` or the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.uploads.max_content_length;
    let request_timeout = state.config.request_timeout();

    // Moderator routes (session required, checked per handler)
    let moderator_routes = Router::new()
        .route("/ideas", get(handlers::moderator::dashboard))
        .route(
            "/ideas/{id}",
            put(handlers::moderator::edit_idea).delete(handlers::moderator::delete_idea),
        )
        .route("/ideas/{id}/status", post(handlers::moderator::change_status))
        .route("/ideas/{id}/approve", post(handlers::moderator::approve))
        .route("/ideas/{id}/partially-approve", post(handlers::moderator::partially_approve))
        .route("/ideas/{id}/reject", post(handlers::moderator::reject))
        .route("/ideas/{id}/start", post(handlers::moderator::start_implementation))
        .route("/ideas/{id}/implement", post(handlers::moderator::mark_implemented))
        .route("/ideas/{id}/publish", post(handlers::moderator::set_published))
        .route("/stats", get(handlers::moderator::stats))
        .route(
            "/categories",
            get(handlers::categories::list_categories).post(handlers::categories::create_category),
        )
        .route(
            "/categories/{id}",
            put(handlers::categories::update_category).delete(handlers::categories::delete_category),
        );

    // API routes
    let api_routes = Router::new()
        // Public idea endpoints
        .route(
            "/ideas",
            get(handlers::ideas::list_ideas).post(handlers::ideas::submit_idea),
        )
        .route("/ideas/{id}", get(handlers::ideas::get_idea))
        .route("/categories", get(handlers::ideas::active_categories))
        .route("/statuses", get(handlers::ideas::statuses))
        .route("/attachments/{id}", get(handlers::attachments::download))

        // Session endpoints
        .route(
            "/session",
            post(handlers::session::login)
                .get(handlers::session::current)
                .delete(handlers::session::logout),
        )
        .nest("/moderator", moderator_routes);

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                // Request ID propagation
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                // Request timeout
                .layer(TimeoutLayer::new(request_timeout))
                // Upload size limit
                .layer(DefaultBodyLimit::max(body_limit))
                // Per-route request metrics
                .layer(axum::middleware::from_fn(middleware::metrics::track_requests)),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
