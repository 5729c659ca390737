//! Integration tests for §8 invariant 6 (zero-filled error trends) and
//! fallback-message resolution.

use std::sync::Arc;

use chrono::Utc;

use pe_cache::memory::InMemoryCache;
use pe_core::ErrorHandler;
use pe_models::{ErrorCode, NewErrorLog};
use pe_store::memory::InMemoryStore;

async fn handler() -> ErrorHandler {
    ErrorHandler::load(Arc::new(InMemoryStore::new()), Arc::new(InMemoryCache::new()))
        .await
        .unwrap()
}

fn error_log(tool: &str) -> NewErrorLog {
    NewErrorLog {
        agent_id: "a".to_string(),
        user_id: "u".to_string(),
        tool: tool.to_string(),
        action: "test_intent".to_string(),
        error_code: ErrorCode::ExecutionError,
        error_message: "boom".to_string(),
        payload: None,
        timestamp: Utc::now(),
    }
}

/// Invariant 6 — `getErrorTrends(N)` returns exactly N entries sorted
/// ascending with every date in the window present, zero-filled if empty.
#[tokio::test]
async fn invariant6_error_trends_are_zero_filled() {
    let h = handler().await;
    h.log_error(error_log("slack")).await;

    let trend = h.get_error_trends(Some(7), None).await.unwrap();
    assert_eq!(trend.len(), 7);
    for w in trend.windows(2) {
        assert!(w[0].date < w[1].date);
    }
    assert_eq!(trend.last().unwrap().count, 1);
    assert!(trend[..trend.len() - 1].iter().all(|p| p.count == 0));
}

/// Fallback resolution order: agent-scoped, then tool-scoped, then
/// built-in default, then the hard-coded constant.
#[tokio::test]
async fn fallback_resolution_hierarchy() {
    let h = handler().await;
    assert_eq!(
        h.get_fallback_message("slack", Some("a1")),
        "The agent encountered an issue while trying to complete this task."
    );

    h.set_fallback_message("slack", None, "slack is having a moment").await.unwrap();
    assert_eq!(h.get_fallback_message("slack", Some("a1")), "slack is having a moment");
    assert_eq!(h.get_fallback_message("slack", None), "slack is having a moment");

    h.set_fallback_message("slack", Some("a1"), "a1's slack is having a moment")
        .await
        .unwrap();
    assert_eq!(h.get_fallback_message("slack", Some("a1")), "a1's slack is having a moment");
    assert_eq!(h.get_fallback_message("slack", Some("a2")), "slack is having a moment");
}

/// Setting a fallback message persists to the Store and reloading the
/// handler from the Store restores it (§9 resolved open question).
#[tokio::test]
async fn fallback_message_survives_reload() {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let h1 = ErrorHandler::load(store.clone(), cache.clone()).await.unwrap();
    h1.set_fallback_message("notion", None, "notion is down").await.unwrap();

    let h2 = ErrorHandler::load(store, cache).await.unwrap();
    assert_eq!(h2.get_fallback_message("notion", None), "notion is down");
}

/// Invariant 5 — `bulkResolveErrors([])` returns 0 without touching the
/// Store.
#[tokio::test]
async fn bulk_resolve_errors_empty_is_noop() {
    let h = handler().await;
    assert_eq!(h.bulk_resolve_errors(&[]).await.unwrap(), 0);
}
