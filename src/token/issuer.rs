//! Token issuance: validate an LMS token request and mint a signed JWT.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};

use super::claims::{TokenClaims, TokenRequest};
use crate::tenant::TenantConfig;
use crate::{Error, Result};

/// `iss` claim stamped into every minted token.
pub const ISSUER: &str = "xapi-lrs-auth-proxy";

/// Mint a signed token for `req` under `tenant`.
///
/// Returns the compact JWT and its absolute expiry.
pub fn issue(tenant: &TenantConfig, req: &TokenRequest) -> Result<(String, DateTime<Utc>)> {
    issue_at(tenant, req, Utc::now())
}

/// Clock-explicit variant of [`issue`]; `now` becomes the `iat` claim.
pub fn issue_at(
    tenant: &TenantConfig,
    req: &TokenRequest,
    now: DateTime<Utc>,
) -> Result<(String, DateTime<Utc>)> {
    validate_request(req)?;

    let ttl = i64::try_from(tenant.token_ttl_seconds)
        .map_err(|_| Error::Config("token_ttl_seconds out of range".into()))?;
    let expires_at = now + Duration::seconds(ttl);

    let claims = TokenClaims {
        tenant_id: tenant.tenant_id.clone(),
        actor: req.actor.clone(),
        registration: req.registration.clone(),
        activity_id: req.activity_id.clone(),
        course_id: req.course_id.clone(),
        permissions: req.permissions.clone(),
        group: req.group.clone(),
        metadata: req.metadata.clone(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
        iss: ISSUER.to_string(),
        sub: req.actor.mbox.clone().unwrap_or_default(),
    };

    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(&tenant.signing_key);
    let token = jsonwebtoken::encode(&header, &claims, &key).map_err(Error::Signing)?;

    Ok((token, expires_at))
}

/// Input constraints on a token request; violations are client errors.
fn validate_request(req: &TokenRequest) -> Result<()> {
    if !req.permissions.write.is_issuance_valid() {
        return Err(Error::InvalidScope(req.permissions.write.to_string()));
    }
    if !req.permissions.write.is_write_capable() {
        return Err(Error::InvalidScope(format!(
            "{} is read-only and cannot be granted for write",
            req.permissions.write
        )));
    }
    if !req.permissions.read.is_issuance_valid() {
        return Err(Error::InvalidScope(req.permissions.read.to_string()));
    }

    if !req.actor.has_identifier() {
        return Err(Error::MalformedRequest(
            "actor must carry an identifier".into(),
        ));
    }
    if req.registration.is_empty() {
        return Err(Error::MalformedRequest("registration is required".into()));
    }
    if req.activity_id.is_empty() {
        return Err(Error::MalformedRequest("activity_id is required".into()));
    }

    if let Some(group) = &req.group {
        if group.object_type != "Group" {
            return Err(Error::MalformedRequest(
                "group objectType must be \"Group\"".into(),
            ));
        }
        if group.member.is_empty() {
            return Err(Error::MalformedRequest(
                "group must have at least one member".into(),
            ));
        }
    }

    Ok(())
}
