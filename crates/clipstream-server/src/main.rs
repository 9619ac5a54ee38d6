mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use clipstream_api::{AppStateInner, routes};
use clipstream_media::CloudinaryUploader;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipstream=debug,clipstream_api=debug,clipstream_db=info,clipstream_media=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database, staging dir and asset host client
    let db = clipstream_db::Database::open(&config.db_path)?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    info!("Staging uploads in {}", config.upload_dir.display());
    let uploader = CloudinaryUploader::new(config.cloudinary.clone())?;

    let state = Arc::new(AppStateInner {
        db,
        uploader: Arc::new(uploader),
        upload_dir: config.upload_dir.clone(),
    });

    let app = routes::router(state).layer(DefaultBodyLimit::max(config.max_upload_bytes));
    let app = routes::with_request_timeout(app, config.request_timeout)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Clipstream server listening on {}", addr);
    info!(
        "Request timeout {}s, max upload {} MB",
        config.request_timeout.as_secs(),
        config.max_upload_bytes / (1024 * 1024)
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable ({}), Ctrl+C only", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
