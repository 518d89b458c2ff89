use std::sync::Arc;

use axum::middleware;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cuppa_matching::config::{AppConfig, StoreBackend};
use cuppa_matching::notify::{EmailNotifier, LogNotifier, Notifier};
use cuppa_matching::routes;
use cuppa_matching::services::RematchWorker;
use cuppa_matching::store::memory::InMemoryStore;
use cuppa_matching::store::postgres::PgStore;
use cuppa_matching::store::Stores;
use cuppa_matching::AppState;
use cuppa_shared::clients::db::create_pool;
use cuppa_shared::clients::email::EmailClient;
use cuppa_shared::middleware::{init_metrics, init_tracing, metrics_middleware};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("cuppa-matching");

    let config = AppConfig::load()?;
    let port = config.port;
    // The shared auth extractor reads the signing secret from the environment.
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "prometheus recorder not installed");
            None
        }
    };

    let stores = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Stores::backed_by(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, data is lost on restart");
            Stores::backed_by(Arc::new(InMemoryStore::new()))
        }
    };

    let notifier: Arc<dyn Notifier> = if config.email_api_key.is_empty() {
        tracing::warn!("no e-mail API key configured, notifications are only logged");
        Arc::new(LogNotifier)
    } else {
        let client = EmailClient::new(&config.email_api_key, &config.email_from, &config.email_from_name);
        Arc::new(EmailNotifier::new(client))
    };

    let cancel = CancellationToken::new();
    let (state, rematch_rx) = AppState::new(config, stores, notifier, metrics, &cancel);
    let state = Arc::new(state);

    let worker = RematchWorker::new(
        Arc::clone(&state.matches),
        state.config.rematch_concurrency,
        cancel.child_token(),
    )
    .spawn(rematch_rx);

    if state.config.run_on_startup {
        let summary = state.scheduler.run_immediately().await;
        tracing::info!(matches_created = summary.matches_created, "startup match generation done");
    }
    let scheduler = state.config.scheduler_enabled.then(|| state.scheduler.start());

    let app = routes::router(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "cuppa-matching starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    if let Some(handle) = scheduler {
        handle.await?;
    }
    worker.await?;
    tracing::info!("cuppa-matching stopped");

    Ok(())
}
