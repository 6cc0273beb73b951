//! Static single-tenant store built from file configuration.

use std::sync::Arc;

use super::{TenantConfig, TenantStore};
use crate::config::Config;
use crate::Result;

/// Registry for single-tenant deployments: every host and every id resolves
/// to the one configured tenant.
pub struct SingleTenantStore {
    config: Arc<TenantConfig>,
}

impl SingleTenantStore {
    /// Build the store from validated file configuration.
    pub fn new(cfg: &Config) -> Result<Self> {
        cfg.validate_single_tenant()?;

        let tenant = TenantConfig {
            tenant_id: "default".to_string(),
            hosts: vec!["*".to_string()],
            lrs_endpoint: cfg.lrs.endpoint.clone(),
            lrs_username: cfg.lrs.username.clone(),
            lrs_password: cfg.lrs.password.clone(),
            signing_key: cfg.auth.signing_key.as_bytes().to_vec(),
            token_ttl_seconds: cfg.auth.token_ttl_seconds,
            lms_keys: cfg.auth.lms_keys.iter().cloned().collect(),
            policy: cfg.auth.policy,
        };

        Ok(Self {
            config: Arc::new(tenant),
        })
    }
}

#[async_trait::async_trait]
impl TenantStore for SingleTenantStore {
    async fn resolve_by_host(&self, _host: &str) -> Result<Arc<TenantConfig>> {
        Ok(Arc::clone(&self.config))
    }

    async fn resolve_by_id(&self, _tenant_id: &str) -> Result<Arc<TenantConfig>> {
        Ok(Arc::clone(&self.config))
    }
}
