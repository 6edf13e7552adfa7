use anyhow::{Context, Result};
use chime_face::FaceEngine;
use chime_hw::{Camera, Speaker};
use chime_store::{EntranceLedger, IdentityStore, PauseStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dispatch;
mod notify;
mod pause;

use config::Config;
use dispatch::DispatchLoop;
use pause::PauseControl;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "chimed starting");

    let config = Config::from_env();
    let shutdown = Arc::new(AtomicBool::new(false));

    let handle = spawn_dispatch(config, shutdown.clone())?;
    tracing::info!("chimed ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    shutdown.store(true, Ordering::SeqCst);

    let _ = tokio::task::spawn_blocking(move || handle.join()).await;
    tracing::info!("chimed shut down");
    Ok(())
}

/// Spawn the dispatch loop on a dedicated OS thread.
///
/// All collaborators are constructed on that thread (the audio output
/// stream is tied to it); a handshake channel reports startup failures
/// back so the daemon still fails fast when the camera, models, or
/// database are unavailable.
fn spawn_dispatch(
    config: Config,
    shutdown: Arc<AtomicBool>,
) -> Result<std::thread::JoinHandle<()>> {
    let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<std::result::Result<(), String>>(1);

    let handle = std::thread::Builder::new()
        .name("chime-dispatch".into())
        .spawn(move || {
            let mut dispatch = match build_loop(&config, shutdown) {
                Ok(dispatch) => {
                    let _ = ready_tx.send(Ok(()));
                    dispatch
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("{err:#}")));
                    return;
                }
            };
            dispatch.run();
        })
        .context("failed to spawn dispatch thread")?;

    ready_rx
        .recv()
        .context("dispatch thread exited during startup")?
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(handle)
}

fn build_loop(
    config: &Config,
    shutdown: Arc<AtomicBool>,
) -> Result<DispatchLoop<Camera, IdentityStore, EntranceLedger, Speaker, FaceEngine>> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data dir {}", parent.display()))?;
    }

    let camera = Camera::open(&config.camera_device)
        .with_context(|| format!("opening camera {}", config.camera_device))?;
    camera.warm_up(config.warmup_frames);

    let engine = FaceEngine::load(&config.model_dir)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;

    let identities = IdentityStore::open(&config.db_path).context("opening identity store")?;
    let ledger = EntranceLedger::open(&config.db_path).context("opening entrance ledger")?;
    let pause = PauseControl::load(PauseStore::open(&config.db_path)?)
        .context("loading pause state")?;

    let audio = Speaker::open().context("opening audio output")?;

    let default_chime = match std::fs::read(&config.chime_path) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::warn!(
                path = %config.chime_path.display(),
                error = %err,
                "default chime not readable; audio fallback disabled"
            );
            None
        }
    };

    let channels = notify::channels_from_config(config);

    tracing::info!(
        tolerance = config.match_tolerance,
        poll_interval_secs = config.poll_interval.as_secs(),
        channels = channels.len(),
        "dispatch loop configured"
    );

    Ok(DispatchLoop {
        camera,
        identities,
        ledger,
        audio,
        engine,
        policy: chime_core::MatchPolicy::new(config.match_tolerance),
        channels,
        pause,
        default_chime,
        poll_interval: config.poll_interval,
        shutdown,
    })
}
