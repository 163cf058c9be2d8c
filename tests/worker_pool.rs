//! Worker pool behaviour through the application context.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mrbuild::{AppConfig, AppContext, PoolError};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_capacity() {
    let (ctx, console) = common::context("debug", 3);

    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..12 {
        let current = Arc::clone(&current);
        let peak = Arc::clone(&peak);
        let completed = Arc::clone(&completed);
        ctx.submit(move || {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            current.fetch_sub(1, Ordering::SeqCst);
            completed.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    // submission returned before the work was done
    assert!(ctx.workers().waiting_queue_size() + ctx.workers().running() > 0);

    ctx.shutdown().await;

    assert_eq!(completed.load(Ordering::SeqCst), 12);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 1);
    assert_eq!(ctx.workers().waiting_queue_size(), 0);
    assert_eq!(ctx.workers().running(), 0);

    let configured = console
        .json_lines()
        .into_iter()
        .find(|l| l["msg"] == "Configuring workers in pool")
        .unwrap();
    assert_eq!(configured["count"], 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_lose_nothing() {
    let (ctx, _) = common::context("info", 4);
    let ctx = Arc::new(ctx);
    let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..800).map(|_| AtomicUsize::new(0)).collect());
    let ids = Arc::new(Mutex::new(HashSet::new()));

    let submitters: Vec<_> = (0..8)
        .map(|s| {
            let ctx = Arc::clone(&ctx);
            let runs = Arc::clone(&runs);
            let ids = Arc::clone(&ids);
            tokio::spawn(async move {
                for i in 0..100 {
                    let runs = Arc::clone(&runs);
                    let slot = s * 100 + i;
                    let id = ctx
                        .submit_async(async move {
                            runs[slot].fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                    ids.lock().unwrap().insert(id);
                }
            })
        })
        .collect();
    for submitter in submitters {
        submitter.await.unwrap();
    }

    ctx.shutdown().await;

    assert_eq!(ids.lock().unwrap().len(), 800);
    assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_discards_queued_tasks() {
    let (ctx, _) = common::context("info", 1);
    let ran = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let ran = Arc::clone(&ran);
        ctx.submit(move || {
            std::thread::sleep(Duration::from_millis(50));
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    while ctx.workers().running() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    ctx.abort().await;

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.workers().waiting_queue_size(), 0);
    assert!(matches!(ctx.submit(|| {}), Err(PoolError::Stopped)));
}

#[tokio::test]
async fn test_submit_wait_returns_after_completion() {
    let (ctx, _) = common::context("info", 2);
    let done = Arc::new(AtomicUsize::new(0));

    let flag = Arc::clone(&done);
    ctx.workers()
        .submit_wait(move || {
            flag.store(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert_eq!(done.load(Ordering::SeqCst), 1);
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_zero_workers_rejected_after_logging() {
    let (logged, console, _) = common::logged(&common::log_config("debug", "json"));
    let err = logged.configure_workers(0).unwrap_err();

    assert!(matches!(err, PoolError::ZeroCapacity));
    let lines = console.json_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["count"], 0);
}

#[tokio::test]
async fn test_bootstrap_from_config() {
    let path = common::temp_log_path();
    let mut config = AppConfig::default();
    config.workers = 2;
    config.log.format = "json".into();
    config.log.file = Some(path.clone());

    let ctx = AppContext::bootstrap(&config).unwrap();
    assert_eq!(ctx.workers().capacity(), 2);

    ctx.submit(|| tracing::warn!(phase = "link", "Slow link step"))
        .unwrap();
    ctx.shutdown().await;

    let written = std::fs::read_to_string(&path).unwrap();
    let line: serde_json::Value = serde_json::from_str(written.lines().last().unwrap()).unwrap();
    assert_eq!(line["msg"], "Slow link step");
    assert_eq!(line["phase"], "link");
    assert!(line["task_id"].is_string());
    std::fs::remove_file(&path).unwrap();
}
