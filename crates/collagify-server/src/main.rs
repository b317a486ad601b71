mod config;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use collagify_db::Store;
use collagify_pipeline::scheduler::{run_once, run_schedule_loop};
use collagify_pipeline::{IngestHandler, Pipeline};
use collagify_telegram::{BotApi, run_update_loop};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "collagify=debug,collagify_pipeline=debug,collagify_telegram=info".into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Check your .env file and restart.");
            std::process::exit(1);
        }
    };

    let store = match Store::open(&config.db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Cannot open store at {}: {}", config.db_path.display(), e);
            std::process::exit(1);
        }
    };
    info!("Store opened at {}", config.db_path.display());

    let api = BotApi::new(config.api_server.clone(), config.bot_token.clone());
    let me = api.get_me().await?;
    info!(
        "Authorized as @{} ({})",
        me.username.as_deref().unwrap_or("?"),
        me.id
    );

    let shared_api = Arc::new(api.clone());
    let handler = Arc::new(IngestHandler::new(
        store.clone(),
        shared_api.clone(),
        config.timezone,
    ));
    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        shared_api.clone(),
        shared_api,
        config.pipeline.clone(),
    ));

    if config.run_on_start {
        info!("Running collage pipeline on start");
        run_once(&pipeline).await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = tokio::spawn(run_schedule_loop(
        pipeline.clone(),
        config.schedule.clone(),
        config.timezone,
        shutdown_rx.clone(),
    ));
    let poller = tokio::spawn(run_update_loop(
        api,
        handler.clone(),
        config.poll_timeout_secs,
        shutdown_rx,
    ));

    info!("Collagify running; schedule evaluated in {}", config.timezone);

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler.await {
        warn!("Scheduler task ended abnormally: {}", e);
    }
    if let Err(e) = poller.await {
        warn!("Update poller task ended abnormally: {}", e);
    }

    drop(pipeline);
    drop(handler);
    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => warn!("Store still referenced at shutdown, leaving it to drop"),
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Cannot install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
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
