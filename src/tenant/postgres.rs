//! PostgreSQL tenant backend.
//!
//! Schema (managed outside the proxy): `tenants`, `tenant_hosts`,
//! `tenant_lrs_config`, `tenant_auth_config`, `tenant_lms_api_keys`, and the
//! `audit_log` written by the deployment's log shipper. Deletes are soft
//! (`status = 'deleted'`) so audit rows keep a valid tenant reference.

use tokio_postgres::NoTls;
use tracing::{error, info};

use super::{digest_lms_key, CreateTenantRequest, Policy, TenantBackend, TenantConfig};
use crate::{Error, Result};

/// [`TenantBackend`] over a PostgreSQL database.
pub struct PgTenantBackend {
    // tokio_postgres transactions need exclusive access; tenant loads are
    // cached upstream so the serialization here is off the hot path.
    client: tokio::sync::Mutex<tokio_postgres::Client>,
}

impl PgTenantBackend {
    /// Connect using a libpq-style connection string.
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(store_err)?;

        // The connection object drives the socket; it lives on its own task.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Tenant database connection failed");
            }
        });

        info!("Connected to tenant database");
        Ok(Self {
            client: tokio::sync::Mutex::new(client),
        })
    }
}

fn store_err(e: tokio_postgres::Error) -> Error {
    Error::Store(e.to_string())
}

fn parse_policy(s: &str) -> Policy {
    if s == "permissive" {
        Policy::Permissive
    } else {
        Policy::Strict
    }
}

#[async_trait::async_trait]
impl TenantBackend for PgTenantBackend {
    async fn tenant_id_for_host(&self, host: &str) -> Result<Option<String>> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT tenant_id FROM tenant_hosts WHERE host = $1",
                &[&host],
            )
            .await
            .map_err(store_err)?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn load(&self, tenant_id: &str) -> Result<Option<TenantConfig>> {
        let client = self.client.lock().await;

        let Some(lrs) = client
            .query_opt(
                "SELECT endpoint, username, password
                 FROM tenant_lrs_config WHERE tenant_id = $1",
                &[&tenant_id],
            )
            .await
            .map_err(store_err)?
        else {
            return Ok(None);
        };

        let auth = client
            .query_one(
                "SELECT signing_key, token_ttl_seconds, permission_policy
                 FROM tenant_auth_config WHERE tenant_id = $1",
                &[&tenant_id],
            )
            .await
            .map_err(store_err)?;

        let hosts = client
            .query(
                "SELECT host FROM tenant_hosts WHERE tenant_id = $1",
                &[&tenant_id],
            )
            .await
            .map_err(store_err)?
            .into_iter()
            .map(|r| r.get(0))
            .collect();

        let lms_keys = client
            .query(
                "SELECT api_key_hash FROM tenant_lms_api_keys
                 WHERE tenant_id = $1 AND revoked = false",
                &[&tenant_id],
            )
            .await
            .map_err(store_err)?
            .into_iter()
            .map(|r| r.get(0))
            .collect();

        let signing_key: String = auth.get(0);
        let ttl: i32 = auth.get(1);
        let policy: String = auth.get(2);

        Ok(Some(TenantConfig {
            tenant_id: tenant_id.to_string(),
            hosts,
            lrs_endpoint: lrs.get(0),
            lrs_username: lrs.get(1),
            lrs_password: lrs.get(2),
            signing_key: signing_key.into_bytes(),
            token_ttl_seconds: u64::try_from(ttl).unwrap_or(3600),
            lms_keys,
            policy: parse_policy(&policy),
        }))
    }

    async fn create(&self, req: &CreateTenantRequest) -> Result<()> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(store_err)?;

        tx.execute(
            "INSERT INTO tenants (tenant_id, status) VALUES ($1, 'active')",
            &[&req.tenant_id],
        )
        .await
        .map_err(store_err)?;

        tx.execute(
            "INSERT INTO tenant_lrs_config (tenant_id, endpoint, username, password)
             VALUES ($1, $2, $3, $4)",
            &[
                &req.tenant_id,
                &req.lrs.endpoint,
                &req.lrs.username,
                &req.lrs.password,
            ],
        )
        .await
        .map_err(store_err)?;

        let ttl = i32::try_from(req.auth.token_ttl_seconds)
            .map_err(|_| Error::MalformedRequest("token_ttl_seconds out of range".into()))?;
        let policy = match req.auth.policy {
            Policy::Strict => "strict",
            Policy::Permissive => "permissive",
        };
        tx.execute(
            "INSERT INTO tenant_auth_config
             (tenant_id, signing_key, token_ttl_seconds, permission_policy)
             VALUES ($1, $2, $3, $4)",
            &[&req.tenant_id, &req.auth.signing_key, &ttl, &policy],
        )
        .await
        .map_err(store_err)?;

        for host in &req.hosts {
            tx.execute(
                "INSERT INTO tenant_hosts (tenant_id, host) VALUES ($1, $2)",
                &[&req.tenant_id, host],
            )
            .await
            .map_err(store_err)?;
        }

        for key in &req.auth.lms_keys {
            let hash = digest_lms_key(key);
            tx.execute(
                "INSERT INTO tenant_lms_api_keys (tenant_id, api_key_hash, description)
                 VALUES ($1, $2, 'Initial API key')",
                &[&req.tenant_id, &hash],
            )
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT tenant_id FROM tenants WHERE status = 'active' ORDER BY tenant_id",
                &[],
            )
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(|r| r.get(0)).collect())
    }

    async fn delete(&self, tenant_id: &str) -> Result<bool> {
        let client = self.client.lock().await;
        let affected = client
            .execute(
                "UPDATE tenants SET status = 'deleted' WHERE tenant_id = $1",
                &[&tenant_id],
            )
            .await
            .map_err(store_err)?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_column_parses_with_strict_fallback() {
        assert_eq!(parse_policy("permissive"), Policy::Permissive);
        assert_eq!(parse_policy("strict"), Policy::Strict);
        assert_eq!(parse_policy("garbage"), Policy::Strict);
    }
}
