//! Folio Server
//!
//! Serves structure, metadata and full text of METS documents over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_server::config::Config;
use folio_server::document::{CacheConfig, DocumentCache, DocumentContext};
use folio_server::fetch::HttpFetcher;
use folio_server::formats::FormatRegistry;
use folio_server::metadata::InMemoryRegistry;
use folio_server::routes;
use folio_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "folio_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Folio Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("File groups: {:?}", config.file_groups.all());

    let registry = match &config.registry_path {
        Some(path) => {
            let registry = InMemoryRegistry::from_path(path)
                .with_context(|| format!("Failed to load registry from {}", path.display()))?;
            tracing::info!(
                "Loaded {} configuration scopes from {}",
                registry.scopes.len(),
                path.display()
            );
            registry
        }
        None => {
            tracing::warn!("REGISTRY_PATH not set, no metadata fields configured");
            InMemoryRegistry::new()
        }
    };
    let registry = Arc::new(registry);

    let fetcher = HttpFetcher::new(config.fetch.timeout_secs)
        .context("Failed to initialize HTTP client")?
        .with_file_access(config.fetch.allow_file_locations);
    if config.fetch.allow_file_locations {
        tracing::warn!("file:// locations are enabled");
    }

    let context = Arc::new(DocumentContext {
        file_groups: config.file_groups.clone(),
        formats: Arc::new(FormatRegistry::with_defaults()),
        metadata: registry.clone(),
        structures: registry.clone(),
        fetcher: Arc::new(fetcher),
    });
    let cache = DocumentCache::new(
        CacheConfig {
            max_documents: config.cache.max_documents,
        },
        context,
    );

    let app_state = AppState::new(config.clone(), cache, registry);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Start server with graceful shutdown
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid SERVER_HOST {}", config.server.host))?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Folio Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
