//! Integration tests for §8 invariant 3 and scenarios S6/S7.

use std::sync::Arc;

use pe_cache::memory::InMemoryCache;
use pe_core::ContextMapper;
use pe_models::NewContextMapping;
use pe_store::memory::InMemoryStore;

fn mapper() -> ContextMapper {
    ContextMapper::new(Arc::new(InMemoryStore::new()), Arc::new(InMemoryCache::new()))
}

fn mapping(agent: &str, tool: &str, key: &str, external_id: &str) -> NewContextMapping {
    NewContextMapping {
        agent_id: agent.to_string(),
        user_id: "u1".to_string(),
        tool: tool.to_string(),
        context_key: key.to_string(),
        external_id: external_id.to_string(),
        metadata: None,
        expires_at: None,
    }
}

/// S6 — upsert, forward lookup, delete, forward lookup misses.
#[tokio::test]
async fn s6_round_trip_then_delete() {
    let m = mapper();
    m.upsert_mapping(mapping("a1", "slack", "channel", "C123")).await.unwrap();

    assert_eq!(
        m.get_external_id("a1", "slack", "channel").await.unwrap(),
        Some("C123".to_string())
    );

    assert!(m.delete_mapping_by_key("a1", "slack", "channel").await.unwrap());
    assert_eq!(m.get_mapping("a1", "slack", "channel").await.unwrap(), None);
}

/// Invariant 3 — the reverse lookup returns the context key most recently
/// written for that external id.
#[tokio::test]
async fn invariant3_reverse_lookup_round_trips() {
    let m = mapper();
    m.upsert_mapping(mapping("a1", "asana", "current_task", "T-42")).await.unwrap();

    assert_eq!(
        m.get_context_key("a1", "asana", "T-42").await.unwrap(),
        Some("current_task".to_string())
    );
}

/// On `updateMapping` changing `externalId`, the reverse lookup for the
/// old external id must no longer resolve (§4.5 coherence rule).
#[tokio::test]
async fn update_mapping_external_id_change_clears_stale_reverse() {
    let m = mapper();
    let created = m
        .upsert_mapping(mapping("a1", "asana", "current_task", "T-1"))
        .await
        .unwrap();

    m.update_mapping(
        created.id,
        pe_models::ContextMappingPatch {
            external_id: Some("T-2".to_string()),
            metadata: None,
            expires_at: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(m.get_context_key("a1", "asana", "T-1").await.unwrap(), None);
    assert_eq!(
        m.get_context_key("a1", "asana", "T-2").await.unwrap(),
        Some("current_task".to_string())
    );
}

/// S7 — bulk upsert of two mappings returns 2 and both are retrievable.
#[tokio::test]
async fn s7_bulk_upsert_two_mappings() {
    let m = mapper();
    let count = m
        .bulk_upsert_mappings(vec![
            mapping("a1", "slack", "channel", "C1"),
            mapping("a1", "slack", "dm", "D1"),
        ])
        .await
        .unwrap();
    assert_eq!(count, 2);

    assert_eq!(
        m.get_external_id("a1", "slack", "channel").await.unwrap(),
        Some("C1".to_string())
    );
    assert_eq!(
        m.get_external_id("a1", "slack", "dm").await.unwrap(),
        Some("D1".to_string())
    );
}

/// Invariant 5 — bulk upsert/delete of an empty list is a no-op returning 0.
#[tokio::test]
async fn bulk_operations_on_empty_input_are_noops() {
    let m = mapper();
    assert_eq!(m.bulk_upsert_mappings(vec![]).await.unwrap(), 0);
    assert_eq!(m.bulk_delete_mappings(vec![]).await.unwrap(), 0);
}
