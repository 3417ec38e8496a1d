//! The refresh scheduler: a single periodic task that re-reads the pointer
//! file and swaps the displayed image when the target changed.
//!
//! All DisplayState mutation happens on this task, so refresh steps are
//! serialized by construction; a tick that lands while a step is still
//! running is coalesced by the interval, never run concurrently.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::events::{DisplayUpdate, NO_IMAGE_LABEL};
use crate::loader::{self, BASE_DENSITY};
use crate::pointer;
use crate::state::DisplayState;

/// Run the scheduler until cancellation. The first tick fires immediately
/// and performs the initial load; subsequent ticks follow the configured
/// cadence. DisplayState is dropped (final dispose) when the task exits.
#[instrument(
    skip(cfg, to_viewer, cancel),
    fields(pointer = %cfg.pointer_path().display(), every = ?cfg.refresh_interval)
)]
pub async fn run(
    cfg: Configuration,
    to_viewer: Sender<DisplayUpdate>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut state = DisplayState::new();
    let mut ticker = tokio::time::interval(cfg.refresh_interval);
    // Overlapping ticks are skipped-and-rescheduled, never queued up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("refresh scheduler started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting refresh task");
                break;
            }
            _ = ticker.tick() => {
                if let Some(update) = refresh_step(&cfg, &mut state).await {
                    if to_viewer.send(update).await.is_err() {
                        info!("viewer gone; exiting refresh task");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

/// One refresh cycle: resolve the pointer target, and when it differs from
/// the last attempted path, load it and swap. Returns the notification for
/// the presenter, or `None` for the steady-state no-op.
///
/// Both filesystem touches (the pointer read and the image decode) run on
/// the blocking pool; the base directory may sit on a slow network mount
/// and must not stall the runtime worker.
pub async fn refresh_step(cfg: &Configuration, state: &mut DisplayState) -> Option<DisplayUpdate> {
    let last_attempt = state.current_path().map(Path::to_path_buf);
    let worker_cfg = cfg.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let target = pointer::resolve(&worker_cfg);
        if last_attempt.as_deref() == Some(target.path.as_path()) {
            return (target, None);
        }
        let loaded = loader::load(&target.path, BASE_DENSITY);
        (target, Some(loaded))
    })
    .await;

    let (target, loaded) = match outcome {
        Ok(parts) => parts,
        Err(join_err) => {
            warn!(error = %join_err, "refresh worker failed");
            return None;
        }
    };

    match loaded {
        None => {
            debug!(path = %target.path.display(), "pointer unchanged; nothing to do");
            None
        }
        Some(Ok(image)) => {
            let image = Arc::new(image);
            state.swap(Some(image.clone()), target.path.clone());
            let label = target.display_label();
            info!(path = %target.path.display(), label, "image swapped in");
            Some(DisplayUpdate {
                image: Some(image),
                label,
            })
        }
        Some(Err(err)) => {
            warn!(path = %target.path.display(), error = %err, "image load failed");
            // Record the broken path so it is not retried until the pointer
            // file content changes again.
            state.swap(None, target.path);
            Some(DisplayUpdate {
                image: None,
                label: NO_IMAGE_LABEL.to_owned(),
            })
        }
    }
}
