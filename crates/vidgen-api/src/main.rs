//! vidgen API server binary.

use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidgen_api::{create_router, ApiConfig, AppState};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vidgen=info".parse().unwrap())
        .add_directive("tower_http=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vidgen-api");

    let config = ApiConfig::from_env();
    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    // Restart hygiene: drop expired locks, resume or fail interrupted runs.
    if let Err(e) = state.services.locks.sweep().await {
        warn!("Startup lock sweep failed: {}", e);
    }
    match state.services.recovery.sweep_interrupted().await {
        Ok(resumable) => {
            // one at a time: the processing lock admits a single run anyway
            let orchestrator = state.orchestrator.clone();
            tokio::spawn(async move {
                for video_id in resumable {
                    info!(video_id = %video_id, "Resuming interrupted run");
                    if let Err(e) = orchestrator.process_video(&video_id).await {
                        warn!(video_id = %video_id, error = %e, "Resumed run ended with error");
                    }
                }
            });
        }
        Err(e) => warn!("Startup recovery sweep failed: {}", e),
    }

    // Periodic maintenance: expired locks, stale runs, cache expiry.
    {
        let services = state.services.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(600));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = services.locks.sweep().await {
                    warn!("Lock sweep failed: {}", e);
                }
                if let Err(e) = services.recovery.sweep_interrupted().await {
                    warn!("Recovery sweep failed: {}", e);
                }
                if let Err(e) = services.cache.cleanup().await {
                    warn!("Cache cleanup failed: {}", e);
                }
            }
        });
    }

    let app = create_router(state);
    let addr = config.bind_addr();
    info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Shutdown complete");
}
