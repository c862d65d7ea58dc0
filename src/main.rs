use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchkey::config::Config;
use launchkey::db::{create_pool_with, init_db};
use launchkey::engine::LicenseEngine;
use launchkey::handlers;
use launchkey::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "launchkey")]
#[command(about = "License issuing and device-bound verification server")]
struct Cli {
    /// Issue a dev license on an empty database (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Issues one license for a dev email when the database has none.
fn seed_dev_data(engine: &LicenseEngine) {
    let existing = match engine.list_licenses(None, &Default::default()) {
        Ok(page) => page.total,
        Err(e) => {
            tracing::warn!("Cannot inspect database for seeding: {}", e);
            return;
        }
    };
    if existing > 0 {
        tracing::info!("Database already has licenses, skipping seed");
        return;
    }

    match engine.issue("dev@launchkey.local") {
        Ok(license) => {
            tracing::info!("============================================");
            tracing::info!("DEV LICENSE ISSUED");
            tracing::info!("Code: {}", license.code);
            tracing::info!("Email: {}", license.email);
            tracing::info!("============================================");
        }
        Err(e) => tracing::warn!("Failed to seed dev license: {}", e),
    }
}

fn remove_database_files(db_path: &str) {
    if let Err(e) = std::fs::remove_file(db_path) {
        tracing::warn!("Failed to remove {}: {}", db_path, e);
    } else {
        tracing::info!("Removed {}", db_path);
    }
    let _ = std::fs::remove_file(format!("{}-wal", db_path));
    let _ = std::fs::remove_file(format!("{}-shm", db_path));
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "launchkey=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.admin_tokens.is_empty() {
        tracing::warn!("No admin tokens configured: admin API will reject every request");
    }
    if config.check_policy.kill_switch {
        tracing::warn!("KILL_SWITCH is on: every license check will be denied");
    }

    if config.rate_limit.trust_proxy_headers {
        tracing::info!("Rate limits keyed on X-Forwarded-For / X-Real-IP");
    }

    let pool = create_pool_with(&config.database_path, config.db_busy_timeout)
        .expect("Failed to create database pool");
    {
        let conn = pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let engine = LicenseEngine::with_system_clock(pool);

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set LAUNCHKEY_ENV=dev)");
        } else {
            seed_dev_data(&engine);
        }
    }

    let state = AppState::new(
        engine,
        config.admin_tokens.clone(),
        config.check_policy.clone(),
    );
    let app = handlers::app(state, config.rate_limit);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    } else if cli.ephemeral {
        tracing::warn!("--ephemeral flag ignored: not in dev mode (set LAUNCHKEY_ENV=dev)");
    }

    tracing::info!("Launchkey server listening on {}", addr);

    // Peer addresses feed the per-IP rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        remove_database_files(&config.database_path);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
