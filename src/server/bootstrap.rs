//! Process bootstrap: wires the stores, rules lane manager, token codec, realtime broker and
//! lifecycle sweeper together, restores a snapshot if persistence is enabled, then serves HTTP +
//! WebSocket until ctrl-c.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::broker::RealtimeBroker;
use crate::clock::{Clock, SystemClock};
use crate::config::{PersistenceMode, RuntimeConfig};
use crate::dispatcher::Dispatcher;
use crate::manager::GameManager;
use crate::snapshot::{normalize_restored_sessions, SnapshotRepository};
use crate::stores::{GameStore, LobbyStore, SessionStore};
use crate::sweeper::Sweeper;
use crate::token::TokenCodec;

use super::routes::FunEuchreServer;

const LOG_TARGET: &str = "server::bootstrap";

pub async fn run_server(config: RuntimeConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let lobby_store = Arc::new(LobbyStore::new(clock.clone(), config.lobby_ttl_ms));
    let game_store = Arc::new(GameStore::new(
        clock.clone(),
        config.game_ttl_ms,
        config.game_retention_ms,
    ));
    let session_store = Arc::new(SessionStore::new(
        clock.clone(),
        config.session_ttl_ms,
        config.game_retention_ms,
    ));

    let snapshot_repository = match config.persistence_mode {
        PersistenceMode::Disabled => None,
        PersistenceMode::File => {
            let path = config
                .persistence_path
                .clone()
                .context("PERSISTENCE_PATH missing despite prior validation")?;
            Some(Arc::new(SnapshotRepository::new(path)))
        }
    };

    if let Some(repository) = &snapshot_repository {
        if let Some(snapshot) = repository
            .load()
            .await
            .context("failed to load persisted snapshot")?
        {
            let now_ms = clock.now_ms();
            lobby_store.replace_all(snapshot.lobby_records);
            game_store.replace_all(snapshot.game_records);
            let sessions =
                normalize_restored_sessions(snapshot.session_records, now_ms, config.reconnect_grace_ms);
            session_store.replace_all(sessions);
            info!(target = LOG_TARGET, "restored runtime snapshot");
        }
    }

    let manager = Arc::new(GameManager::new(game_store.clone(), clock.clone()));
    let broker = Arc::new(RealtimeBroker::new());
    let token_codec = Arc::new(TokenCodec::new(config.reconnect_token_secret_bytes()));

    let dispatcher = Arc::new(Dispatcher::new(
        lobby_store.clone(),
        game_store.clone(),
        session_store.clone(),
        manager,
        broker.clone(),
        token_codec,
        clock.clone(),
        config.reconnect_grace_ms,
    ));

    let sweeper = Arc::new(Sweeper::new(
        lobby_store,
        game_store,
        session_store,
        broker,
        clock,
        snapshot_repository,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = tokio::spawn(sweeper.run(config.lifecycle_sweep_interval_ms, shutdown_rx));

    let server = FunEuchreServer::new(dispatcher);
    let router = server.into_router();

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    let local_addr = listener.local_addr()?;
    info!(target = LOG_TARGET, %local_addr, "fun euchre server listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target = LOG_TARGET, error = %err, "failed to install ctrl-c handler");
    }
    info!(target = LOG_TARGET, "shutdown signal received");
}
