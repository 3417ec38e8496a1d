use std::fs;
use std::path::Path;
use std::time::Duration;

use pointer_frame::config::Configuration;
use pointer_frame::events::{DisplayUpdate, NO_IMAGE_LABEL};
use pointer_frame::tasks::refresh;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const RECV_BUDGET: Duration = Duration::from_secs(5);

fn cfg_for(base: &Path, refresh_secs: u64) -> Configuration {
    Configuration {
        pointer_filename: "default.txt".to_owned(),
        fullscreen: false,
        base_directory: base.to_path_buf(),
        refresh_interval: Duration::from_secs(refresh_secs),
    }
}

fn write_png(path: &Path) {
    image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 128, 255, 255]))
        .save(path)
        .expect("fixture png should encode");
}

async fn next_update(rx: &mut mpsc::Receiver<DisplayUpdate>) -> DisplayUpdate {
    timeout(RECV_BUDGET, rx.recv())
        .await
        .expect("scheduler should send within the budget")
        .expect("scheduler should still be running")
}

#[tokio::test]
async fn first_tick_delivers_the_initial_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_for(dir.path(), 1);
    write_png(&dir.path().join("sunrise.png"));
    fs::write(cfg.pointer_path(), "sunrise.png").expect("pointer write");

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);
    let task = tokio::spawn(refresh::run(cfg, tx, cancel.clone()));

    let update = next_update(&mut rx).await;
    assert_eq!(update.label, "sunrise");
    assert!(update.image.is_some());

    cancel.cancel();
    task.await.expect("join").expect("clean exit");
}

#[tokio::test]
async fn pointer_rewrite_is_picked_up_on_a_later_tick() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_for(dir.path(), 1);
    write_png(&dir.path().join("a.png"));
    write_png(&dir.path().join("b.png"));
    fs::write(cfg.pointer_path(), "a.png").expect("pointer write");

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);
    let task = tokio::spawn(refresh::run(cfg.clone(), tx, cancel.clone()));

    assert_eq!(next_update(&mut rx).await.label, "a");

    fs::write(cfg.pointer_path(), "b.png").expect("pointer rewrite");
    let update = next_update(&mut rx).await;
    assert_eq!(update.label, "b");
    assert!(update.image.is_some());

    cancel.cancel();
    task.await.expect("join").expect("clean exit");
}

#[tokio::test]
async fn broken_target_degrades_once_then_goes_quiet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_for(dir.path(), 1);
    fs::write(cfg.pointer_path(), "nowhere.jpg").expect("pointer write");

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);
    let task = tokio::spawn(refresh::run(cfg, tx, cancel.clone()));

    let update = next_update(&mut rx).await;
    assert!(update.image.is_none());
    assert_eq!(update.label, NO_IMAGE_LABEL);

    // Same broken content on following ticks: no retry, so no update.
    let quiet = timeout(Duration::from_millis(2500), rx.recv()).await;
    assert!(quiet.is_err(), "unchanged broken pointer should stay quiet");

    cancel.cancel();
    task.await.expect("join").expect("clean exit");
}

#[tokio::test]
async fn missing_pointer_file_reports_no_image_instead_of_failing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_for(dir.path(), 1);

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);
    let task = tokio::spawn(refresh::run(cfg, tx, cancel.clone()));

    let update = next_update(&mut rx).await;
    assert!(update.image.is_none());
    assert_eq!(update.label, NO_IMAGE_LABEL);

    cancel.cancel();
    task.await.expect("join").expect("clean exit");
}

#[tokio::test(start_paused = true)]
async fn backed_up_ticks_never_queue_duplicate_refreshes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_for(dir.path(), 1);
    write_png(&dir.path().join("a.png"));
    write_png(&dir.path().join("b.png"));
    write_png(&dir.path().join("c.png"));
    fs::write(cfg.pointer_path(), "a.png").expect("pointer write");

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(1);
    let task = tokio::spawn(refresh::run(cfg.clone(), tx, cancel.clone()));

    assert_eq!(next_update(&mut rx).await.label, "a");

    // Expire sixty tick deadlines at once. The first backlogged tick starts
    // a refresh, and every deadline behind it lands while that refresh is
    // still in flight. Queued-up ticks would replay the same content as
    // extra updates; serialized coalescing yields exactly one per change.
    fs::write(cfg.pointer_path(), "b.png").expect("pointer rewrite");
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(next_update(&mut rx).await.label, "b");
    let quiet = timeout(Duration::from_secs(30), rx.recv()).await;
    assert!(quiet.is_err(), "backlogged ticks must coalesce, not replay");

    // Same again, proving the backlog left no latent tick behind.
    fs::write(cfg.pointer_path(), "c.png").expect("pointer rewrite");
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(next_update(&mut rx).await.label, "c");
    let quiet = timeout(Duration::from_secs(30), rx.recv()).await;
    assert!(quiet.is_err(), "backlogged ticks must coalesce, not replay");

    cancel.cancel();
    task.await.expect("join").expect("clean exit");
}

#[tokio::test]
async fn closing_the_receiver_stops_the_scheduler() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_for(dir.path(), 1);
    write_png(&dir.path().join("only.png"));
    fs::write(cfg.pointer_path(), "only.png").expect("pointer write");

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);
    let task = tokio::spawn(refresh::run(cfg.clone(), tx, cancel.clone()));

    next_update(&mut rx).await;
    drop(rx);
    // Force another send attempt so the closed channel is observed.
    fs::write(cfg.pointer_path(), "other.png").expect("pointer rewrite");

    timeout(RECV_BUDGET, task)
        .await
        .expect("scheduler should notice the closed channel")
        .expect("join")
        .expect("clean exit");
}
