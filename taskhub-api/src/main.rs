//! # TaskHub API Server
//!
//! Team task management behind a permission-based authorization engine.
//!
//! ## Architecture
//!
//! Every endpoint sends a request through the mediator, which runs the
//! capture, sanitize, validate and authorize behaviors before the handler.
//! Storage is PostgreSQL when `DATABASE_URL` is set and in-memory otherwise.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p taskhub-api
//! ```

use anyhow::Context;
use std::sync::Arc;
use taskhub_api::app::{build_router, AppState};
use taskhub_api::config::Config;
use taskhub_shared::commands::{build_mediator, seed, Services};
use taskhub_shared::db::{migrations::run_migrations, pool};
use taskhub_shared::store::identity::PgIdentityStore;
use taskhub_shared::store::postgres::PgStore;
use taskhub_shared::store::StoreBackend;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskhub_api=debug,taskhub_shared=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TaskHub API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    let (services, db) = match &config.database {
        Some(database) => {
            let mut pool_config = pool::DatabaseConfig::new(database.url.clone());
            pool_config.max_connections = database.max_connections;
            let db = pool::create_pool(pool_config)
                .await
                .context("Failed to connect to database")?;
            run_migrations(&db).await.context("Failed to run migrations")?;

            let store: Arc<dyn StoreBackend> = Arc::new(PgStore::new(db.clone()));
            let identity = Arc::new(PgIdentityStore::new(db.clone()));
            (Services::new(store, identity, config.jwt.secret.clone()), Some(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data will not survive a restart");
            (Services::in_memory(config.jwt.secret.clone()), None)
        }
    };

    if let Some(admin) = &config.admin {
        let user = seed::ensure_admin(services.store.as_ref(), &admin.name, &admin.email, &admin.password)
            .await
            .context("Failed to seed administrator")?;
        tracing::info!(user_id = %user.id, "Administrator ready");
    }

    let addr = config.bind_address();
    let state = AppState::new(build_mediator(&services), config, db);
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Waits for Ctrl-C, then cancels every in-flight request
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, cancelling in-flight requests");
    shutdown.cancel();
}
