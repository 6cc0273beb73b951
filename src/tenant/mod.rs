//! Tenant registry: resolves hostnames and tenant ids to per-tenant policy.
//!
//! Two implementations of the same capability:
//!
//! - [`SingleTenantStore`] is one tenant from file configuration, wildcard host.
//! - [`DynamicTenantStore`] is backed by an external store through the
//!   [`TenantBackend`] interface, with a host→config memo in front.
//!
//! Admin operations (create/list/delete) are a second, optional capability:
//! [`TenantStore::admin`] returns `None` for the static store, so callers
//! never downcast.

pub mod dynamic;
pub mod postgres;
pub mod single;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Result;

pub use dynamic::{DynamicTenantStore, TenantBackend};
pub use postgres::PgTenantBackend;
pub use single::SingleTenantStore;

/// Behavior when a token carries a scope with no evaluator branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Deny requests under unknown scopes.
    #[default]
    Strict,
    /// Admit requests under unknown scopes.
    Permissive,
}

/// Runtime policy for one tenant.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    /// Opaque unique tenant identifier.
    pub tenant_id: String,
    /// Hostnames routing to this tenant; `*` for the single-tenant deployment.
    pub hosts: Vec<String>,
    /// Absolute base URL of the tenant's LRS.
    pub lrs_endpoint: String,
    /// HTTP Basic username toward the LRS.
    pub lrs_username: String,
    /// HTTP Basic password toward the LRS.
    pub lrs_password: String,
    /// Symmetric token signing key (≥32 bytes recommended).
    pub signing_key: Vec<u8>,
    /// Token lifetime in seconds.
    pub token_ttl_seconds: u64,
    /// Accepted LMS bearer credentials. File-configured tenants hold the raw
    /// key; store-backed tenants hold its SHA-256 hex digest.
    pub lms_keys: HashSet<String>,
    /// Unknown-scope behavior.
    pub policy: Policy,
}

impl TenantConfig {
    /// Whether a presented LMS credential is accepted by this tenant.
    ///
    /// Checks the raw key first, then its digest, so both stored forms work.
    #[must_use]
    pub fn accepts_lms_key(&self, key: &str) -> bool {
        self.lms_keys.contains(key) || self.lms_keys.contains(&digest_lms_key(key))
    }
}

/// SHA-256 hex digest of an LMS key, the form persisted by the tenant store.
#[must_use]
pub fn digest_lms_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

// Secrets never leave the process: the serialized form carries only the
// routable identity fields (admin GET responses).
impl Serialize for TenantConfig {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Public<'a> {
            tenant_id: &'a str,
            hosts: &'a [String],
            lrs_endpoint: &'a str,
            policy: Policy,
        }

        Public {
            tenant_id: &self.tenant_id,
            hosts: &self.hosts,
            lrs_endpoint: &self.lrs_endpoint,
            policy: self.policy,
        }
        .serialize(serializer)
    }
}

/// Tenant lookup capability shared by both deployment modes.
#[async_trait::async_trait]
pub trait TenantStore: Send + Sync + 'static {
    /// Resolve the tenant serving `host`.
    async fn resolve_by_host(&self, host: &str) -> Result<Arc<TenantConfig>>;

    /// Resolve a tenant by its identifier.
    async fn resolve_by_id(&self, tenant_id: &str) -> Result<Arc<TenantConfig>>;

    /// Admin capability, present only on store-backed registries.
    fn admin(&self) -> Option<&dyn TenantAdmin> {
        None
    }
}

/// Administrative tenant operations (multi-tenant deployments only).
#[async_trait::async_trait]
pub trait TenantAdmin: Send + Sync {
    /// Provision a new tenant.
    async fn create(&self, req: CreateTenantRequest) -> Result<()>;

    /// List active tenant ids.
    async fn list(&self) -> Result<Vec<String>>;

    /// Delete a tenant.
    async fn delete(&self, tenant_id: &str) -> Result<()>;
}

/// Body of `POST /admin/tenants`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenantRequest {
    /// New tenant identifier.
    pub tenant_id: String,
    /// Hostnames routing to the tenant.
    pub hosts: Vec<String>,
    /// Upstream LRS connection.
    pub lrs: LrsSettings,
    /// Authentication settings.
    pub auth: AuthSettings,
}

/// Upstream LRS settings of a tenant being created.
#[derive(Debug, Clone, Deserialize)]
pub struct LrsSettings {
    /// Absolute LRS base URL.
    pub endpoint: String,
    /// Basic auth username.
    pub username: String,
    /// Basic auth password.
    pub password: String,
}

/// Auth settings of a tenant being created.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Token signing key.
    pub signing_key: String,
    /// Token lifetime in seconds.
    #[serde(default = "default_ttl")]
    pub token_ttl_seconds: u64,
    /// LMS credentials to accept (stored as SHA-256 digests).
    pub lms_keys: Vec<String>,
    /// Unknown-scope behavior.
    #[serde(default)]
    pub policy: Policy,
}

fn default_ttl() -> u64 {
    3600
}
