//! Tenant Directory Resolver. One shared, well-known document maps tenant ids
//! to their data document handles and carries the super-admin's provisioned
//! tenant list. The directory is the single source of truth for the mapping;
//! handles are cached (in memory and durably) to keep the hot path off the
//! network.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::cache::SnapshotCache;
use crate::error::{StoreError, SyncError};
use crate::model::TenantAccount;
use crate::store::{DocHandle, DocumentStore};

const TENANTS_LIST_KEY: &str = "tenants_list";

pub struct Directory {
    store: Arc<dyn DocumentStore>,
    handle: DocHandle,
    cache: Arc<SnapshotCache>,
    resolved: DashMap<String, DocHandle>,
}

impl Directory {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        directory_handle: impl Into<String>,
        cache: Arc<SnapshotCache>,
    ) -> Self {
        Self {
            store,
            handle: DocHandle(directory_handle.into()),
            cache,
            resolved: DashMap::new(),
        }
    }

    async fn fetch(&self) -> Result<Map<String, Value>, StoreError> {
        match self.store.read_document(&self.handle).await? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Malformed(format!(
                "directory document is not an object: {other}"
            ))),
        }
    }

    fn cached(&self, tenant_id: &str) -> Option<DocHandle> {
        if let Some(h) = self.resolved.get(tenant_id) {
            return Some(h.clone());
        }
        match self.cache.load_handle(tenant_id) {
            Ok(Some(h)) => {
                self.resolved.insert(tenant_id.to_string(), h.clone());
                Some(h)
            }
            _ => None,
        }
    }

    fn remember(&self, tenant_id: &str, handle: &DocHandle) {
        self.resolved
            .insert(tenant_id.to_string(), handle.clone());
        if let Err(e) = self.cache.save_handle(tenant_id, handle) {
            tracing::warn!(tenant = tenant_id, error = %e, "failed to persist handle");
        }
    }

    /// Resolves a tenant to its data document handle.
    ///
    /// Without `refresh`, a cached handle short-circuits the directory fetch.
    /// With `refresh` (privileged roles, forced pushes) the directory is
    /// always consulted. `Ok(None)` means the tenant has no handle yet and
    /// the caller should provision one. If the directory is unreachable the
    /// resolver degrades to the cached handle, or defers sync when there is
    /// none.
    pub async fn resolve(
        &self,
        tenant_id: &str,
        refresh: bool,
    ) -> Result<Option<DocHandle>, SyncError> {
        if !refresh {
            if let Some(h) = self.cached(tenant_id) {
                return Ok(Some(h));
            }
        }

        match self.fetch().await {
            Ok(map) => {
                if let Some(h) = map.get(tenant_id).and_then(Value::as_str) {
                    let handle = DocHandle(h.to_string());
                    self.remember(tenant_id, &handle);
                    Ok(Some(handle))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.is_transient() || matches!(e, StoreError::NotFound) => {
                match self.cached(tenant_id) {
                    Some(h) => {
                        tracing::warn!(tenant = tenant_id, error = %e, "directory unreachable, using cached handle");
                        Ok(Some(h))
                    }
                    None => Err(SyncError::DirectoryUnavailable),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Registers a freshly created handle. Always read-modify-write against
    /// the latest directory snapshot; a concurrent registration for the same
    /// tenant resolves to whichever write lands last, orphaning the loser's
    /// document.
    pub async fn register(&self, tenant_id: &str, handle: &DocHandle) -> Result<(), SyncError> {
        let mut map = self.fetch().await?;
        map.insert(
            tenant_id.to_string(),
            Value::String(handle.as_str().to_string()),
        );
        self.store
            .replace_document(&self.handle, &Value::Object(map))
            .await?;
        self.remember(tenant_id, handle);
        Ok(())
    }

    /// Drops every cached copy of a tenant's handle, forcing re-discovery.
    pub fn forget(&self, tenant_id: &str) {
        self.resolved.remove(tenant_id);
        if let Err(e) = self.cache.clear_handle(tenant_id) {
            tracing::warn!(tenant = tenant_id, error = %e, "failed to clear cached handle");
        }
    }

    /*──────── privileged: tenants_list ───────*/

    pub async fn load_tenants(&self) -> Result<Vec<TenantAccount>, SyncError> {
        let map = self.fetch().await?;
        Ok(parse_tenants(&map))
    }

    /// Adds or replaces a tenant account in `tenants_list`.
    pub async fn register_tenant(&self, account: TenantAccount) -> Result<(), SyncError> {
        let mut map = self.fetch().await?;
        let mut tenants = parse_tenants(&map);
        tenants.retain(|t| t.id != account.id);
        tenants.push(account);
        map.insert(
            TENANTS_LIST_KEY.to_string(),
            serde_json::to_value(&tenants).map_err(|e| StoreError::Malformed(e.to_string()))?,
        );
        self.store
            .replace_document(&self.handle, &Value::Object(map))
            .await?;
        Ok(())
    }

    /// Removes the directory mapping and the account entry. The tenant's data
    /// document is left behind, dangling in the remote store.
    pub async fn deprovision_tenant(&self, tenant_id: &str) -> Result<(), SyncError> {
        let mut map = self.fetch().await?;
        map.remove(tenant_id);
        let mut tenants = parse_tenants(&map);
        tenants.retain(|t| t.id != tenant_id);
        map.insert(
            TENANTS_LIST_KEY.to_string(),
            serde_json::to_value(&tenants).map_err(|e| StoreError::Malformed(e.to_string()))?,
        );
        self.store
            .replace_document(&self.handle, &Value::Object(map))
            .await?;
        self.forget(tenant_id);
        Ok(())
    }
}

fn parse_tenants(map: &Map<String, Value>) -> Vec<TenantAccount> {
    map.get(TENANTS_LIST_KEY)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}
