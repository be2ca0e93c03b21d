mod config;
mod main_lib;

use config::Config;
use folio_sync_core::SessionHandle;
use main_lib::{
    build_daemon, init_tracing, spawn_event_logger, spawn_snapshot_logger, spawn_status_logger,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let daemon = build_daemon(&config)?;
    let coordinator = daemon.coordinator;

    let status_logger = spawn_status_logger(coordinator.subscribe_status());
    let snapshot_logger = spawn_snapshot_logger(coordinator.subscribe_snapshot());
    let event_logger = spawn_event_logger(daemon.events.subscribe());

    let sessions = SessionHandle::new(Some(config.session()));
    let runner = {
        let coordinator = coordinator.clone();
        let sessions = sessions.subscribe();
        tokio::spawn(async move { coordinator.run(sessions).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    // Closing the session stream ends the run loop, which tears sync down.
    drop(sessions);
    runner.await?;

    status_logger.abort();
    snapshot_logger.abort();
    event_logger.abort();
    Ok(())
}
