use std::sync::Arc;
use std::time::Duration;

use kubebrowser_platform_access::{ClaimsExtractor, Materializer, MemorySessionStore, SessionStore};
use kubebrowser_records::{KubeRecordSource, RecordSource, StaticRecordSource};
use kubebrowser_server::app::{AppSettings, AppState, build_router};
use kubebrowser_server::auth::{OidcClient, PgSessionStore};
use kubebrowser_server::config::{LogFormat, ServerConfig};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for the record cache's initial sync.
const RECORD_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");

    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,tower_http=debug".into()),
    );
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
    tracing::info!(namespace = %config.namespace, "Loaded configuration");

    let settings = AppSettings::from_config(&config).expect("invalid session configuration");

    // Session store: PostgreSQL when configured, otherwise in-process
    let sessions: Arc<dyn SessionStore> = match &config.session.database_url {
        Some(database_url) => {
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .expect("failed to connect to database");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&db_pool)
                .await
                .expect("failed to run migrations");

            Arc::new(PgSessionStore::new(db_pool, config.session_ttl()))
        }
        None => {
            tracing::warn!("no database configured, sessions are kept in memory");
            Arc::new(MemorySessionStore::new(config.session_ttl()))
        }
    };

    // Cleanup expired sessions on startup
    match sessions.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(
                deleted_sessions = count,
                "Cleaned up expired sessions on startup"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions on startup");
        }
    }

    // Spawn periodic session cleanup task
    let cleanup_sessions = sessions.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_sessions.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    let records: Arc<dyn RecordSource> = match &config.records_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading records from file");
            Arc::new(StaticRecordSource::from_json_file(path).expect("failed to load records file"))
        }
        None => {
            tracing::info!("Waiting for Kubeconfig cache to sync...");
            Arc::new(
                KubeRecordSource::connect(&config.namespace, RECORD_SYNC_TIMEOUT)
                    .await
                    .expect("failed to start Kubeconfig watch"),
            )
        }
    };

    // Initialize OIDC client
    tracing::info!("Discovering OIDC provider...");
    let oidc_client = OidcClient::discover(&config.oidc, config.redirect_uri())
        .await
        .expect("failed to discover OIDC provider");

    let app_state = Arc::new(AppState {
        idp: Arc::new(oidc_client),
        sessions,
        records,
        claims: ClaimsExtractor::new(config.oidc.groups_claim()),
        materializer: Materializer::new((&config.oidc).into()),
        settings,
    });

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
