//! Integration tests for §8 invariant 7 (exactly-once claim) and the
//! Scheduler's cancel/retry lifecycle.

use std::sync::Arc;

use chrono::Utc;

use pe_cache::memory::InMemoryCache;
use pe_core::Scheduler;
use pe_models::{NewScheduledTask, TaskStatus};
use pe_store::memory::InMemoryStore;

fn scheduler() -> Scheduler {
    Scheduler::new(Arc::new(InMemoryStore::new()), Arc::new(InMemoryCache::new()))
}

fn due_task() -> NewScheduledTask {
    NewScheduledTask {
        agent_id: "a".to_string(),
        user_id: "u".to_string(),
        tool: "mock".to_string(),
        action: "test_intent".to_string(),
        payload: serde_json::Map::new(),
        execute_at: Utc::now() - chrono::Duration::seconds(1),
    }
}

/// Invariant 7 — claiming twice never returns the same task twice; the
/// second claim against an already-`processing` batch is empty.
#[tokio::test]
async fn invariant7_claim_is_exactly_once() {
    let s = scheduler();
    s.schedule_task(due_task()).await.unwrap();
    s.schedule_task(due_task()).await.unwrap();

    let first = s.claim_due_tasks(Some(10), Utc::now()).await.unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|t| t.status == TaskStatus::Processing));

    let second = s.claim_due_tasks(Some(10), Utc::now()).await.unwrap();
    assert!(second.is_empty());
}

/// `cancelTask` is only valid from `scheduled` and is idempotent.
#[tokio::test]
async fn cancel_is_idempotent_from_scheduled() {
    let s = scheduler();
    let task = s.schedule_task(due_task()).await.unwrap();

    let cancelled = s.cancel_task(task.id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);

    let cancelled_again = s.cancel_task(task.id).await.unwrap();
    assert_eq!(cancelled_again.status, TaskStatus::Cancelled);
}

/// Cancelling an already-claimed (processing) task is rejected.
#[tokio::test]
async fn cancel_after_claim_is_rejected() {
    let s = scheduler();
    s.schedule_task(due_task()).await.unwrap();
    let claimed = s.claim_due_tasks(Some(1), Utc::now()).await.unwrap();
    assert_eq!(claimed.len(), 1);

    let result = s.cancel_task(claimed[0].id).await;
    assert!(result.is_err());
}

/// A completed task writes a terminal status that `retry_task` cannot
/// resuscitate past the attempt ceiling.
#[tokio::test]
async fn retry_respects_max_attempts() {
    let s = scheduler();
    let task = s.schedule_task(due_task()).await.unwrap();
    let claimed = s.claim_due_tasks(Some(1), Utc::now()).await.unwrap();
    assert_eq!(claimed[0].attempts, 1);
    s.fail_task(task.id, pe_models::ErrorDetail {
        code: pe_models::ErrorCode::ExecutionError,
        message: "boom".to_string(),
        details: None,
    })
    .await
    .unwrap();

    let retried = s
        .retry_task(task.id, chrono::Duration::seconds(0), 1)
        .await
        .unwrap();
    assert!(retried.is_none(), "attempts already at the configured max");
}
