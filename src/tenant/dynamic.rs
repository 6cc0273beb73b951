//! Store-backed tenant registry with a host→config memo.
//!
//! The external store is abstracted behind [`TenantBackend`]; the registry
//! adds a `DashMap` cache keyed by hostname so the hot path (one lookup per
//! request) normally costs one shard read. Create and delete drop every
//! cache entry referencing the affected tenant, so concurrent readers see
//! either the pre- or post-mutation snapshot, never a torn one.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use super::{CreateTenantRequest, TenantAdmin, TenantConfig, TenantStore};
use crate::{Error, Result};

/// External tenant store interface (persistence is an external collaborator).
#[async_trait::async_trait]
pub trait TenantBackend: Send + Sync + 'static {
    /// Map a hostname to a tenant id, if any tenant claims it.
    async fn tenant_id_for_host(&self, host: &str) -> Result<Option<String>>;

    /// Load the full configuration of a tenant.
    async fn load(&self, tenant_id: &str) -> Result<Option<TenantConfig>>;

    /// Persist a new tenant.
    async fn create(&self, req: &CreateTenantRequest) -> Result<()>;

    /// List active tenant ids.
    async fn list(&self) -> Result<Vec<String>>;

    /// Delete a tenant. Returns `false` when no such tenant exists.
    async fn delete(&self, tenant_id: &str) -> Result<bool>;
}

/// Registry for multi-tenant deployments.
pub struct DynamicTenantStore {
    backend: Arc<dyn TenantBackend>,
    cache: DashMap<String, Arc<TenantConfig>>,
}

impl DynamicTenantStore {
    /// Wrap an external store.
    #[must_use]
    pub fn new(backend: Arc<dyn TenantBackend>) -> Self {
        Self {
            backend,
            cache: DashMap::new(),
        }
    }

    /// Drop every cached entry referencing `tenant_id`, whichever host it was
    /// memoized under.
    fn invalidate(&self, tenant_id: &str) {
        self.cache.retain(|_, cfg| cfg.tenant_id != tenant_id);
    }

    #[cfg(test)]
    fn cached_hosts(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait::async_trait]
impl TenantStore for DynamicTenantStore {
    async fn resolve_by_host(&self, host: &str) -> Result<Arc<TenantConfig>> {
        if let Some(cached) = self.cache.get(host) {
            return Ok(Arc::clone(&cached));
        }

        let tenant_id = self
            .backend
            .tenant_id_for_host(host)
            .await?
            .ok_or(Error::TenantNotFound)?;

        let config = self
            .backend
            .load(&tenant_id)
            .await?
            .ok_or(Error::TenantNotFound)?;

        let config = Arc::new(config);
        self.cache.insert(host.to_string(), Arc::clone(&config));
        debug!(host = %host, tenant_id = %config.tenant_id, "Cached tenant config");

        Ok(config)
    }

    async fn resolve_by_id(&self, tenant_id: &str) -> Result<Arc<TenantConfig>> {
        let config = self
            .backend
            .load(tenant_id)
            .await?
            .ok_or(Error::TenantNotFound)?;
        Ok(Arc::new(config))
    }

    fn admin(&self) -> Option<&dyn TenantAdmin> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl TenantAdmin for DynamicTenantStore {
    async fn create(&self, req: CreateTenantRequest) -> Result<()> {
        self.backend.create(&req).await?;
        self.invalidate(&req.tenant_id);
        info!(tenant_id = %req.tenant_id, hosts = ?req.hosts, "Tenant created");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.backend.list().await
    }

    async fn delete(&self, tenant_id: &str) -> Result<()> {
        if !self.backend.delete(tenant_id).await? {
            return Err(Error::TenantNotFound);
        }
        self.invalidate(tenant_id);
        info!(tenant_id = %tenant_id, "Tenant deleted");
        Ok(())
    }
}
