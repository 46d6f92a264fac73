//! ContractDesk API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication (bearer JWTs)
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Request},
    http::StatusCode,
    middleware::{from_fn, Next},
    routing::{get, post},
    Router,
};
use contractdesk_common::{
    auth::{AuthService, JwtManager},
    config::{AppConfig, ObservabilityConfig},
    contracts::{ContractService, UploadPolicy},
    db::{ContractStore, DbPool, InvoiceStore, Repository, UserStore},
    errors::AppError,
    invoices::InvoiceService,
    metrics, storage, BlobStore,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::Notify};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// An upload request may carry this many maximum-size files
const MAX_FILES_PER_UPLOAD: usize = 10;

/// Application state shared across handlers
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtManager>,
    pub auth: Arc<AuthService>,
    pub contracts: Arc<ContractService>,
    pub invoices: Arc<InvoiceService>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        contract_store: Arc<dyn ContractStore>,
        invoice_store: Arc<dyn InvoiceStore>,
        user_store: Arc<dyn UserStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, AppError> {
        let secret = config.auth.jwt_secret.as_deref().ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret is not set".to_string(),
        })?;

        let jwt = Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs));
        let policy = UploadPolicy::from(&config.storage);

        Ok(Self {
            auth: Arc::new(AuthService::new(user_store, jwt.clone())),
            jwt,
            contracts: Arc::new(ContractService::new(contract_store, blobs, policy)),
            invoices: Arc::new(InvoiceService::new(invoice_store)),
            config,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    let config = Arc::new(config);

    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting ContractDesk API Gateway v{}",
        contractdesk_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_upload_duration_seconds", metrics::METRICS_PREFIX)),
                metrics::UPLOAD_BUCKETS,
            )?
            .install()?;
        info!(port = config.observability.metrics_port, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }
    let repository = Arc::new(Repository::new(db));

    // Initialize blob storage
    let blobs = storage::from_config(&config.storage).await?;

    // Create app state
    let state = AppState::new(
        config.clone(),
        repository.clone(),
        repository.clone(),
        repository,
        blobs,
    )?;

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // In-flight requests get `shutdown_timeout` to finish once a signal arrives
    let shutdown = Arc::new(Notify::new());
    let signalled = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signalled.notify_one();
        })
        .into_future();
    let drain_deadline = async {
        shutdown.notified().await;
        tokio::time::sleep(config.shutdown_timeout()).await;
    };

    tokio::select! {
        result = server => result?,
        _ = drain_deadline => warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Shutdown timeout elapsed, dropping open connections"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Result<Router, AppError> {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let upload_limit = config.storage.max_file_bytes.saturating_mul(MAX_FILES_PER_UPLOAD);

    // API routes
    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Sign-in (no auth)
        .route("/auth/login", post(handlers::auth::login))

        // Contract endpoints
        .route("/contracts", get(handlers::contracts::list_contracts))
        .route("/contracts/pages", get(handlers::contracts::contract_pages))
        .route(
            "/contracts/upload",
            post(handlers::contracts::upload_contracts).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/contracts/{id}", get(handlers::contracts::get_contract))
        .route("/contracts/{id}/documents", get(handlers::contracts::get_documents))

        // Invoice endpoints
        .route(
            "/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route("/invoices/pages", get(handlers::invoices::invoice_pages))
        .route(
            "/invoices/{id}",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )

        // Customer endpoints
        .route("/customers", get(handlers::customers::list_customers))
        .route("/customers/search", get(handlers::customers::search_customers))

        // Dashboard endpoints
        .route("/dashboard/cards", get(handlers::dashboard::cards))
        .route("/dashboard/latest-invoices", get(handlers::dashboard::latest_invoices))
        .route("/dashboard/revenue", get(handlers::dashboard::revenue));

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(from_fn(middleware::metrics::track_requests));

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        )?;
        app = app.layer(from_fn(move |request: Request, next: Next| {
            middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone())
        }));
    }

    // Compose the app
    Ok(app
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests.max(1)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
