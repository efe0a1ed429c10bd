/// Recording Service - HTTP Server
///
/// Starts and stops cloud recordings, tracks their sessions and serves
/// playback links. A background task sweeps stale pending acquisitions.
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use recording_service::config::Config;
use recording_service::db::{PgSessionStore, SessionStore};
use recording_service::handlers;
use recording_service::metrics;
use recording_service::services::{
    AgoraCloudRecording, MediaService, ObjectStore, OrchestratorSettings, PendingSweeper,
    PlaybackResolver, PlaybackSettings, RecordingOrchestrator, S3ObjectStore, TokenIssuer,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,recording_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(env = %config.app.env, "Starting recording-service");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed successfully");

    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(db_pool));
    let media: Arc<dyn MediaService> = Arc::new(
        AgoraCloudRecording::new(&config.agora, &config.s3, config.upstream.timeout())
            .context("Invalid cloud recording configuration")?,
    );
    let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::from_config(&config.s3).await);

    let orchestrator = RecordingOrchestrator::new(
        store.clone(),
        media.clone(),
        OrchestratorSettings::from_config(&config.agora, &config.upstream),
    );
    let resolver = PlaybackResolver::new(
        store.clone(),
        objects,
        PlaybackSettings::from_config(&config.s3, &config.upstream),
    );
    let issuer = TokenIssuer::new(
        media,
        config.agora.app_id.clone(),
        config.agora.token_ttl_secs,
        config.upstream.timeout(),
    );

    let sweeper = PendingSweeper::new(store, config.reconciliation.pending_ttl());
    let sweeper_task = sweeper.spawn(config.reconciliation.sweep_interval());

    let orchestrator = web::Data::new(orchestrator);
    let resolver = web::Data::new(resolver);
    let issuer = web::Data::new(issuer);

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(address = %bind_address, "HTTP server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(orchestrator.clone())
            .app_data(resolver.clone())
            .app_data(issuer.clone())
            .wrap(middleware::Logger::default())
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server failed")?;

    sweeper_task.abort();
    tracing::info!("recording-service stopped");
    Ok(())
}
