use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pointer_frame::{config, events::DisplayUpdate, tasks};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("wgpu_core=warn".parse().expect("static directive"))
            .add_directive("wgpu_hal=warn".parse().expect("static directive"))
            .add_directive("winit=warn".parse().expect("static directive"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let workdir = std::env::current_dir().context("failed to resolve working directory")?;
    let cfg = config::load_or_bootstrap(&workdir)
        .with_context(|| format!("failed to load configuration under {}", workdir.display()))?;
    info!(
        pointer = %cfg.pointer_path().display(),
        refresh = ?cfg.refresh_interval,
        fullscreen = cfg.fullscreen,
        "configuration loaded",
    );

    let cancel = CancellationToken::new();
    let (to_viewer, from_refresh) = mpsc::channel::<DisplayUpdate>(4);

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received; shutting down");
                cancel.cancel();
            }
        });
    }

    let refresh = {
        let cancel = cancel.clone();
        let cfg = cfg.clone();
        tokio::spawn(async move {
            if let Err(err) = tasks::refresh::run(cfg, to_viewer, cancel).await {
                warn!(error = ?err, "refresh task exited with error");
            }
        })
    };

    // The event loop owns the main thread until the window closes.
    let viewer_result = tasks::viewer::run_windowed(from_refresh, cancel.clone(), cfg);

    cancel.cancel();
    let _ = refresh.await;

    viewer_result
}
