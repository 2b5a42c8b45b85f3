//! Megano storefront - session cart and checkout service

use anyhow::Result;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tower_sessions::{ExpiredDeletion, MemoryStore};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use megano_storefront::{
    services::EventPublisher,
    session_layer,
    store::{memory::MemoryCatalog, postgres::PgStore},
    AppState, Config, Stores,
};

/// How often expired sessions are swept from Postgres.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let events = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => EventPublisher::new(Some(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events disabled");
                EventPublisher::disabled()
            }
        },
        None => EventPublisher::disabled(),
    };

    let app: Router = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;

            let sessions = PostgresStore::new(db.clone());
            tokio::spawn({
                let sessions = sessions.clone();
                async move {
                    if let Err(e) = sessions.continuously_delete_expired(SESSION_SWEEP_INTERVAL).await {
                        tracing::error!(error = %e, "Expired session sweep stopped");
                    }
                }
            });

            let state = AppState::new(&config, Stores::postgres(PgStore::new(db)), events);
            megano_storefront::router(state, session_layer(sessions, &config))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            let catalog = Arc::new(MemoryCatalog::new());
            match &config.catalog_fixture {
                Some(path) => {
                    let count = catalog.load_fixture(path).await?;
                    tracing::info!(path = %path.display(), products = count, "Catalog seeded from fixture");
                }
                None => tracing::warn!("CATALOG_FIXTURE not set, the catalog is empty and every basket add will be rejected"),
            }
            let state = AppState::new(&config, Stores::memory(catalog), events);
            megano_storefront::router(state, session_layer(MemoryStore::default(), &config))
        }
    };

    let addr = config.socket_addr();
    tracing::info!("Megano storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
