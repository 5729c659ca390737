use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use pe_cache::Cache;
use pe_models::{ContextMapping, ContextMappingPatch, Id, NewContextMapping};
use pe_store::{Store, StoreError};

use crate::error::{CoreResult, EngineError};
use crate::keys;

/// Translates between an agent-local identifier and an external provider
/// identifier, scoped to `(agent, tool)` (§4.5). Every mutation touches
/// the Store first, then writes or deletes both cache keys.
pub struct ContextMapper {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

fn cache_ttl(expires_at: Option<chrono::DateTime<Utc>>) -> Option<Duration> {
    expires_at.map(|exp| {
        let seconds = (exp - Utc::now()).num_seconds().max(1) as u64;
        Duration::from_secs(seconds)
    })
}

impl ContextMapper {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    async fn write_cache(&self, mapping: &ContextMapping) {
        let ttl = cache_ttl(mapping.expires_at);
        let fwd = keys::context_map(&mapping.agent_id, &mapping.tool, &mapping.context_key);
        let rev = keys::context_map_rev(&mapping.agent_id, &mapping.tool, &mapping.external_id);
        let _ = self.cache.set(&fwd, &mapping.external_id, ttl).await;
        let _ = self.cache.set(&rev, &mapping.context_key, ttl).await;
    }

    async fn evict_cache(&self, mapping: &ContextMapping) {
        let fwd = keys::context_map(&mapping.agent_id, &mapping.tool, &mapping.context_key);
        let rev = keys::context_map_rev(&mapping.agent_id, &mapping.tool, &mapping.external_id);
        self.cache.delete(&fwd).await.ok();
        self.cache.delete(&rev).await.ok();
    }

    /// Plain insert: fails with a conflict if `(agent, tool, contextKey)`
    /// is already mapped, unlike [`Self::upsert_mapping`].
    pub async fn create_mapping(&self, new: NewContextMapping) -> CoreResult<ContextMapping> {
        if self
            .store
            .get_context_mapping(&new.agent_id, &new.tool, &new.context_key)
            .await?
            .is_some()
        {
            return Err(EngineError::DatabaseError(StoreError::Conflict(format!(
                "mapping already exists for ({}, {}, {})",
                new.agent_id, new.tool, new.context_key
            ))));
        }
        self.upsert_mapping(new).await
    }

    pub async fn upsert_mapping(&self, new: NewContextMapping) -> CoreResult<ContextMapping> {
        let mapping = self.store.upsert_context_mapping(new).await?;
        self.write_cache(&mapping).await;
        Ok(mapping)
    }

    pub async fn get_mapping(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> CoreResult<Option<ContextMapping>> {
        Ok(self.store.get_context_mapping(agent_id, tool, context_key).await?)
    }

    pub async fn get_external_id(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> CoreResult<Option<String>> {
        let fwd = keys::context_map(agent_id, tool, context_key);
        if let Some(cached) = self.cache.get(&fwd).await.ok().flatten() {
            return Ok(Some(cached));
        }
        let mapping = self.store.get_context_mapping(agent_id, tool, context_key).await?;
        if let Some(mapping) = &mapping {
            self.write_cache(mapping).await;
        }
        Ok(mapping.map(|m| m.external_id))
    }

    pub async fn get_context_key(
        &self,
        agent_id: &str,
        tool: &str,
        external_id: &str,
    ) -> CoreResult<Option<String>> {
        let rev = keys::context_map_rev(agent_id, tool, external_id);
        if let Some(cached) = self.cache.get(&rev).await.ok().flatten() {
            return Ok(Some(cached));
        }
        let mapping = self
            .store
            .get_context_mapping_by_external_id(agent_id, tool, external_id)
            .await?;
        if let Some(mapping) = &mapping {
            self.write_cache(mapping).await;
        }
        Ok(mapping.map(|m| m.context_key))
    }

    /// On an `externalId` change, the stale reverse key is deleted before
    /// the new reverse key is written, preventing a transient
    /// double-reverse that would resolve to the wrong `contextKey` (§4.5
    /// coherence rule).
    pub async fn update_mapping(
        &self,
        id: Id,
        patch: ContextMappingPatch,
    ) -> CoreResult<Option<ContextMapping>> {
        let Some(before) = self.store.get_context_mapping_by_id(id).await? else {
            return Ok(None);
        };
        let external_id_changed = patch
            .external_id
            .as_ref()
            .map(|new_ext| new_ext != &before.external_id)
            .unwrap_or(false);

        if external_id_changed {
            let stale_rev = keys::context_map_rev(&before.agent_id, &before.tool, &before.external_id);
            self.cache.delete(&stale_rev).await.ok();
        }

        let Some(after) = self.store.update_context_mapping(id, patch).await? else {
            return Ok(None);
        };
        self.write_cache(&after).await;
        Ok(Some(after))
    }

    pub async fn delete_mapping_by_id(&self, id: Id) -> CoreResult<bool> {
        let Some(mapping) = self.store.get_context_mapping_by_id(id).await? else {
            return Ok(false);
        };
        let deleted = self.store.delete_context_mapping_by_id(id).await?;
        if deleted {
            self.evict_cache(&mapping).await;
        }
        Ok(deleted)
    }

    pub async fn delete_mapping_by_key(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> CoreResult<bool> {
        let Some(mapping) = self.store.get_context_mapping(agent_id, tool, context_key).await? else {
            return Ok(false);
        };
        let deleted = self
            .store
            .delete_context_mapping_by_key(agent_id, tool, context_key)
            .await?;
        if deleted {
            self.evict_cache(&mapping).await;
        }
        Ok(deleted)
    }

    pub async fn list_mappings(&self, agent_id: &str, tool: &str) -> CoreResult<Vec<ContextMapping>> {
        Ok(self.store.list_context_mappings(agent_id, tool).await?)
    }

    /// `bulkUpsertMappings([])` returns 0 without touching the Store.
    /// Otherwise each mapping is upserted independently and the count of
    /// successes is returned — a failure partway through does not roll
    /// back earlier successes.
    pub async fn bulk_upsert_mappings(&self, mappings: Vec<NewContextMapping>) -> CoreResult<usize> {
        if mappings.is_empty() {
            return Ok(0);
        }
        let mut count = 0;
        for new in mappings {
            match self.upsert_mapping(new).await {
                Ok(_) => count += 1,
                Err(err) => tracing::warn!(?err, "bulk context-mapping upsert failed for one entry"),
            }
        }
        Ok(count)
    }

    /// `bulkDeleteMappings([])` returns 0 without touching the Store. No
    /// all-or-nothing semantics: each id is deleted independently.
    pub async fn bulk_delete_mappings(&self, ids: Vec<Id>) -> CoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut count = 0;
        for id in ids {
            if self.delete_mapping_by_id(id).await? {
                count += 1;
            }
        }
        Ok(count)
    }
}
