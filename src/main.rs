mod config;
mod db;
mod entities;
mod error;
mod jobs;
mod legacy;
mod models;
mod reconciler;
mod retry;
mod routes;
mod scanner;
mod scheduler;
mod tmdb;
mod writer;

#[cfg(test)]
mod testing;

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    config::{Config, PersistenceMode},
    jobs::{CatalogJob, CatalogSync, JobKind, SyncContext},
    legacy::{BatchLoader, FileSink},
    routes::AppState,
    scheduler::{StatusBoard, SyncJob, SystemClock},
    tmdb::TmdbClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cinesync=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = wreq::Client::builder().timeout(Duration::from_secs(30)).build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_access_token.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_rps,
    );

    let files = config.persistence == PersistenceMode::Files;
    let sync = Arc::new(CatalogSync {
        ctx: SyncContext {
            source: Arc::new(tmdb),
            retry: config.retry,
            image_base_url: config.tmdb_image_base_url.clone(),
        },
        db: db.clone(),
        sink: files.then(|| FileSink::new(config.legacy_dirs.clone())),
        loader: files
            .then(|| BatchLoader::new(config.legacy_dirs.clone(), config.legacy_batch_size)),
    });

    let times = &config.job_times;
    let mut kinds = vec![
        (JobKind::Films, times.films),
        (JobKind::Celebrities, times.celebrities),
        (JobKind::Trending, times.trending),
        (JobKind::Countries, times.countries),
    ];
    if files {
        kinds.push((JobKind::LegacyImport, times.legacy_import));
    }

    let board = StatusBoard::default();
    let cancel = CancellationToken::new();
    let clock = Arc::new(SystemClock);

    let handles: Vec<_> = kinds
        .into_iter()
        .map(|(kind, at)| {
            let job: Arc<dyn SyncJob> = Arc::new(CatalogJob::new(kind, at, sync.clone()));
            tokio::spawn(scheduler::run_job(job, clock.clone(), board.clone(), cancel.clone()))
        })
        .collect();

    let app = routes::router(Arc::new(AppState { db, board }));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, mode = ?config.persistence, "listening");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    for joined in futures::future::join_all(handles).await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "job loop panicked");
        }
    }
    tracing::info!("shut down");

    Ok(())
}
