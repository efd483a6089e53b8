#![allow(missing_docs)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use omni_refresh::{RefreshJob, RefreshJobManager, RefreshManagerSummary, RefreshStatus};

use support::{ScriptedProbe, Step, ids};

fn job(items: &[&str]) -> Arc<RefreshJob> {
    Arc::new(RefreshJob::new(
        ids(items),
        ScriptedProbe::always(Step::Incomplete),
    ))
}

#[test]
fn add_get_and_list_jobs() {
    let manager = RefreshJobManager::new();
    assert!(manager.is_empty());

    let first = job(&["a"]);
    let second = job(&["b", "c"]);
    manager.add_job(Arc::clone(&first));
    manager.add_job(Arc::clone(&second));

    let found = manager.get_job(first.id()).expect("first job registered");
    assert!(Arc::ptr_eq(&found, &first));
    assert!(manager.get_job("refresh-missing").is_none());

    let mut listed: Vec<String> = manager
        .list_jobs()
        .iter()
        .map(|job| job.id().to_string())
        .collect();
    listed.sort();
    let mut expected = vec![first.id().to_string(), second.id().to_string()];
    expected.sort();
    assert_eq!(listed, expected);
}

#[test]
fn adding_same_id_replaces_entry() {
    let manager = RefreshJobManager::new();
    let first = job(&["a"]);
    manager.add_job(Arc::clone(&first));
    manager.add_job(Arc::clone(&first));
    assert_eq!(manager.len(), 1);

    let removed = manager.remove_job(first.id()).expect("job removed");
    assert!(Arc::ptr_eq(&removed, &first));
    assert!(manager.is_empty());
}

#[test]
fn cleanup_never_removes_unfinished_jobs() {
    let manager = RefreshJobManager::new();
    let pending = job(&["a"]);
    manager.add_job(Arc::clone(&pending));

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(manager.cleanup_completed(Duration::ZERO), 0);
    assert!(manager.get_job(pending.id()).is_some());
    assert_eq!(pending.status(), RefreshStatus::Pending);
}

#[tokio::test]
async fn cleanup_keeps_in_progress_jobs() {
    let manager = RefreshJobManager::new();
    let running = job(&["a"]);
    manager.add_job(Arc::clone(&running));

    let waiter = {
        let running = Arc::clone(&running);
        tokio::spawn(async move { running.wait(Duration::from_secs(60)).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(running.status(), RefreshStatus::InProgress);

    assert_eq!(manager.cleanup_completed(Duration::ZERO), 0);
    assert!(manager.get_job(running.id()).is_some());

    running.cancel();
    let _ = waiter.await.expect("waiter should not panic");
}

#[test]
fn cleanup_removes_only_stale_terminal_jobs() {
    let manager = RefreshJobManager::new();
    let stale = job(&["a"]);
    let pending = job(&["b"]);
    manager.add_job(Arc::clone(&stale));
    manager.add_job(Arc::clone(&pending));

    stale.cancel();
    assert_eq!(manager.cleanup_completed(Duration::from_secs(3600)), 0);
    assert_eq!(manager.len(), 2);

    std::thread::sleep(Duration::from_millis(100));
    let fresh = job(&["c"]);
    fresh.cancel();
    manager.add_job(Arc::clone(&fresh));

    assert_eq!(manager.cleanup_completed(Duration::from_millis(50)), 1);
    assert!(manager.get_job(stale.id()).is_none());
    assert!(manager.get_job(fresh.id()).is_some());
    assert!(manager.get_job(pending.id()).is_some());
}

#[test]
fn summary_counts_jobs_by_status() {
    let manager = RefreshJobManager::new();
    let pending = job(&["a"]);
    let cancelled = job(&["b"]);
    cancelled.cancel();
    manager.add_job(pending);
    manager.add_job(cancelled);

    assert_eq!(
        manager.summary(),
        RefreshManagerSummary {
            total_jobs: 2,
            pending: 1,
            cancelled: 1,
            ..RefreshManagerSummary::default()
        }
    );
}

#[tokio::test]
async fn cleanup_loop_evicts_finished_jobs() {
    let manager = Arc::new(RefreshJobManager::new());
    let finished = job(&["a"]);
    finished.cancel();
    manager.add_job(Arc::clone(&finished));
    let pending = job(&["b"]);
    manager.add_job(Arc::clone(&pending));

    let handle = manager.spawn_cleanup_loop(Duration::from_millis(10), Duration::ZERO);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while manager.get_job(finished.id()).is_some() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "cleanup loop should evict the finished job"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(manager.get_job(pending.id()).is_some());

    handle.abort();
}
