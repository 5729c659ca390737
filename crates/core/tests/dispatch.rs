//! Integration tests for the dispatch pipeline against the testable
//! properties and concrete scenarios in spec §8 (invariants 1, 2, 5 and
//! scenarios S1, S2, S4, S5).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use pe_cache::memory::InMemoryCache;
use pe_cache::{Cache, CacheExt};
use pe_core::adapter::Adapter;
use pe_core::error::CoreResult;
use pe_core::{ErrorHandler, PluginEngineBuilder, Scheduler};
use pe_models::{AdapterMetadata, AuthStatus, ErrorCode, ErrorDetail, EngineResult as Result, TaskIntent};
use pe_store::memory::InMemoryStore;
use pe_store::Store;

/// A scriptable reference adapter local to these integration tests
/// (`pe-core` cannot depend on `pe-adapters` without a cycle, per §9
/// "Cyclic risk").
struct TestAdapter {
    connected: Mutex<bool>,
    next_failure: Mutex<Option<ErrorDetail>>,
}

impl TestAdapter {
    fn new() -> Self {
        Self {
            connected: Mutex::new(true),
            next_failure: Mutex::new(None),
        }
    }

    fn fail_next(&self, error: ErrorDetail) {
        *self.next_failure.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl Adapter for TestAdapter {
    fn tool(&self) -> &str {
        "mock"
    }

    async fn connect(&self, _user_id: &str) -> CoreResult<AuthStatus> {
        Ok(AuthStatus {
            connected: true,
            expires_at: None,
            scopes: None,
            error: None,
        })
    }

    async fn is_connected(&self, _user_id: &str) -> bool {
        *self.connected.lock().unwrap()
    }

    async fn send(&self, _agent_id: &str, _user_id: &str, payload: Value) -> Result {
        if let Some(error) = self.next_failure.lock().unwrap().take() {
            return Result::fail(error.message.clone(), error);
        }
        Result::ok_with_data("ok", json!({ "echo": payload }))
    }

    async fn fetch(&self, _agent_id: &str, _user_id: &str, query: Option<Value>) -> Result {
        if let Some(error) = self.next_failure.lock().unwrap().take() {
            return Result::fail(error.message.clone(), error);
        }
        Result::ok_with_data("ok", json!({ "echo": query }))
    }

    async fn disconnect(&self, _user_id: &str) -> CoreResult<()> {
        *self.connected.lock().unwrap() = false;
        Ok(())
    }

    fn get_metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: "mock".to_string(),
            name: "Mock".to_string(),
            description: "test adapter".to_string(),
            version: "1.0.0".to_string(),
            author: "tests".to_string(),
            scopes: vec![],
            config_schema: None,
        }
    }
}

fn intent(tool: &str, action: &str) -> TaskIntent {
    let mut context = serde_json::Map::new();
    context.insert("k".to_string(), json!("v"));
    TaskIntent {
        agent_id: "a".to_string(),
        user_id: "u".to_string(),
        tool: tool.to_string(),
        intent: action.to_string(),
        context,
        scheduled_time: None,
    }
}

async fn build_engine() -> (
    pe_core::PluginEngine,
    Arc<dyn Store>,
    Arc<dyn Cache>,
    Arc<TestAdapter>,
) {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    let error_handler = Arc::new(ErrorHandler::load(store.clone(), cache.clone()).await.unwrap());
    let scheduler = Arc::new(Scheduler::new(store.clone(), cache.clone()));
    let adapter = Arc::new(TestAdapter::new());

    let engine = PluginEngineBuilder::new()
        .register_adapter(adapter.clone())
        .build(error_handler, scheduler, cache.clone());

    (engine, store, cache, adapter)
}

/// S1 — immediate send succeeds and caches the result.
#[tokio::test]
async fn s1_immediate_send_caches_result() {
    let (engine, _store, cache, _adapter) = build_engine().await;

    let result = engine.process_intent(intent("mock", "test_intent")).await;
    assert!(result.success);

    let cached: Option<Result> = cache.get_json("result:a:mock:test_intent").await.unwrap();
    assert!(cached.is_some());
}

/// S2 — unknown tool produces the exact documented message and no log.
#[tokio::test]
async fn s2_unknown_tool_reports_adapter_not_found() {
    let (engine, store, _cache, _adapter) = build_engine().await;

    let result = engine.process_intent(intent("nope", "test_intent")).await;
    assert!(!result.success);
    assert_eq!(result.message, "No adapter found for tool: nope");

    let errors = store.list_agent_errors("a", 10).await.unwrap();
    assert!(errors.is_empty());
}

/// Invariant 1 / S3 — a future scheduled time forks to the Scheduler and
/// never touches the adapter.
#[tokio::test]
async fn invariant1_future_schedule_does_not_invoke_adapter() {
    let (engine, store, _cache, adapter) = build_engine().await;
    adapter.fail_next(ErrorDetail {
        code: ErrorCode::ExecutionError,
        message: "should never be called".to_string(),
        details: None,
    });

    let mut future = intent("mock", "test_intent");
    future.scheduled_time = Some(Utc::now() + chrono::Duration::hours(1));

    let result = engine.process_intent(future).await;
    assert!(result.success);
    let task_id = result.data.unwrap()["taskId"].as_str().unwrap().to_string();
    assert!(!task_id.is_empty());

    let tasks = store.list_scheduled_tasks("u").await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, pe_models::TaskStatus::Scheduled);
}

/// A scheduled time in the past is treated as immediate (§4.1 step 1).
#[tokio::test]
async fn past_schedule_is_treated_as_immediate() {
    let (engine, store, _cache, _adapter) = build_engine().await;

    let mut past = intent("mock", "test_intent");
    past.scheduled_time = Some(Utc::now() - chrono::Duration::hours(1));

    let result = engine.process_intent(past).await;
    assert!(result.success);
    assert!(store.list_scheduled_tasks("u").await.unwrap().is_empty());
}

/// Invariant 2 / S4 — after the 11th logged error in the window, the
/// dispatcher short-circuits with a message naming the cause and the
/// adapter is never invoked again.
#[tokio::test]
async fn invariant2_circuit_opens_after_eleven_errors() {
    let (engine, _store, cache, adapter) = build_engine().await;

    for _ in 0..11 {
        adapter.fail_next(ErrorDetail {
            code: ErrorCode::ExecutionError,
            message: "boom".to_string(),
            details: None,
        });
        let result = engine.process_intent(intent("mock", "test_intent")).await;
        assert!(!result.success);
    }

    let count = cache.get_counter("error_count:a:mock").await.unwrap();
    assert_eq!(count, 11);

    let result = engine.process_intent(intent("mock", "test_intent")).await;
    assert!(!result.success);
    assert!(result.message.contains("disabled due to excessive errors"));
    assert_eq!(result.error.unwrap().code, ErrorCode::ToolDisabled);
}

/// S5 — an adapter-reported failure logs one error row, increments the
/// counter, and surfaces the fallback alongside the structured error.
#[tokio::test]
async fn s5_adapter_failure_logs_and_reports_fallback() {
    let (engine, store, cache, adapter) = build_engine().await;
    adapter.fail_next(ErrorDetail {
        code: ErrorCode::ExecutionError,
        message: "boom".to_string(),
        details: None,
    });

    let result = engine.process_intent(intent("mock", "test_intent")).await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.code, ErrorCode::ExecutionError);
    assert_eq!(error.message, "boom");
    assert!(result.message.starts_with("boom."));

    let errors = store.list_agent_errors("a", 10).await.unwrap();
    assert_eq!(errors.len(), 1);

    let count = cache.get_counter("error_count:a:mock").await.unwrap();
    assert_eq!(count, 1);
}

/// Invariant 5 — `bulkResolveErrors([])` is a no-op that never touches the
/// Store.
#[tokio::test]
async fn invariant5_bulk_resolve_empty_is_noop() {
    let (_engine, store, cache, _adapter) = build_engine().await;
    let error_handler = ErrorHandler::load(store, cache).await.unwrap();
    let resolved = error_handler.bulk_resolve_errors(&[]).await.unwrap();
    assert_eq!(resolved, 0);
}

/// Unsupported action names are rejected before the adapter is reached.
#[tokio::test]
async fn unsupported_action_name_is_rejected() {
    let (engine, _store, _cache, adapter) = build_engine().await;
    adapter.fail_next(ErrorDetail {
        code: ErrorCode::ExecutionError,
        message: "should not run".to_string(),
        details: None,
    });

    let result = engine.process_intent(intent("mock", "reticulate_splines")).await;
    assert!(!result.success);
    assert_eq!(result.error.unwrap().code, ErrorCode::UnsupportedAction);
}

/// Disconnecting the adapter surfaces `NOT_CONNECTED` without reaching
/// `send`/`fetch`.
#[tokio::test]
async fn not_connected_short_circuits_before_execute() {
    let (engine, _store, _cache, adapter) = build_engine().await;
    adapter.disconnect("u").await.unwrap();
    adapter.fail_next(ErrorDetail {
        code: ErrorCode::ExecutionError,
        message: "should not run".to_string(),
        details: None,
    });

    let result = engine.process_intent(intent("mock", "test_intent")).await;
    assert!(!result.success);
    assert_eq!(result.error.unwrap().code, ErrorCode::NotConnected);
}
