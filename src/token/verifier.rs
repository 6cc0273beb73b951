//! Token verification: signature, algorithm, expiry, and tenant binding.
//!
//! Every failure collapses to the same 401 "Invalid token" so callers cannot
//! probe which sub-check rejected them. The precise cause still lands in the
//! logs at `warn`.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::warn;

use super::claims::TokenClaims;
use crate::tenant::TenantConfig;
use crate::{Error, Result};

/// Generic message for every verification failure.
const INVALID_TOKEN: &str = "Invalid token";

/// Verify `token` under the resolved tenant and return its claims.
///
/// Accepts HS256 only; any other algorithm (including `none`) fails. Expiry
/// is checked with zero leeway, and the token's `tenant_id` claim must match
/// the tenant that the request's hostname resolved to.
pub fn verify(token: &str, tenant: &TenantConfig) -> Result<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let key = DecodingKey::from_secret(&tenant.signing_key);
    let data = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation).map_err(|e| {
        warn!(tenant_id = %tenant.tenant_id, error = %e, "Token verification failed");
        Error::Unauthenticated(INVALID_TOKEN)
    })?;

    if data.claims.tenant_id != tenant.tenant_id {
        warn!(
            token_tenant = %data.claims.tenant_id,
            host_tenant = %tenant.tenant_id,
            "Tenant mismatch in token"
        );
        return Err(Error::Unauthenticated(INVALID_TOKEN));
    }

    Ok(data.claims)
}
