//! Point d'entrée de la station QafRadio.
//!
//! Assemble catalogue, sink passerelle, ordonnanceur et interface HTTP,
//! puis tourne jusqu'à SIGINT/SIGTERM en sauvegardant la position de
//! reprise à l'arrêt.

mod api;
mod config;

use std::sync::Arc;

use qafcatalog::RecitationCatalog;
use qafsink::GatewaySink;
use qafstation::{PresenceHub, StateStore, StationError, StationScheduler, spawn_autosave};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::config::RadioConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // ========== PHASE 1 : Configuration et catalogue ==========

    let config = RadioConfig::load()?;

    let catalog = RecitationCatalog::new(&config.audio_dir);
    match catalog.list_reciters() {
        Ok(reciters) => info!("🎙️ {} reciter collection(s) found", reciters.len()),
        Err(err) => warn!("⚠️ Audio directory not readable yet: {}", err),
    }

    let store = StateStore::new(&config.state_file);
    let resume = store.load(&config.default_reciter).await;
    info!(
        track = resume.track.get(),
        reciter = %resume.reciter,
        "Resuming station state"
    );

    // ========== PHASE 2 : Station et autosauvegarde ==========

    let presence = Arc::new(PresenceHub::new());
    let sink = GatewaySink::new(config.media.public_url.clone())?;
    let target = config.gateway.target();
    info!("📻 Station will stream to {}", target);

    let (scheduler, station) = StationScheduler::spawn(
        sink,
        catalog.clone(),
        presence.clone(),
        Some(target),
        resume,
    );
    let autosave = spawn_autosave(store.clone(), station.clone(), config.autosave_interval());

    // ========== PHASE 3 : Serveur HTTP ==========

    let state = AppState {
        station: station.clone(),
        catalog,
        presence,
        media_root: config.audio_dir.clone(),
    };
    let app = api::radio_router(state);

    let addr = config.http.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("🌐 HTTP interface listening on http://{addr}");
    info!("  - /api/status    : playback state (JSON)");
    info!("  - /api/player/*  : skip, previous, pause, resume, stop, reciter");
    info!("  - /api/events    : presence updates (SSE)");
    info!("  - /media/...     : audio files pulled by the gateway");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ========== PHASE 4 : Arrêt ==========

    info!("Shutting down, saving station state...");
    autosave.abort();
    match station.shutdown().await {
        Ok(final_state) => {
            if let Err(err) = store.save(&final_state).await {
                warn!("⚠️ Final state save failed: {}", err);
            }
        }
        Err(err) => warn!("⚠️ Station already gone at shutdown: {}", err),
    }

    match scheduler.wait().await {
        Ok(()) => info!("✅ Station stopped"),
        Err(StationError::NoTargetConfigured) => {
            error!("❌ No room target configured, the station had nothing to play to");
        }
        Err(err) => error!("❌ Station ended with an error: {}", err),
    }

    Ok(())
}

/// Résout au premier SIGINT ou SIGTERM reçu.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl_c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
