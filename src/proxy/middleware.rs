//! Request middleware: tenant resolution, LMS authentication, token
//! verification, and admin authentication.
//!
//! Resolved tenant config and verified claims travel in request extensions,
//! request-scoped rather than process-global. Each middleware pulls what the
//! previous one attached.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::router::AppState;
use crate::tenant::TenantConfig;
use crate::token;
use crate::Error;

/// Resolve the tenant serving the request's hostname and attach it.
pub async fn resolve_tenant(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(host) = request_hostname(&req) else {
        return Error::TenantNotFound.into_response();
    };

    match state.tenants.resolve_by_host(&host).await {
        Ok(tenant) => {
            req.extensions_mut().insert(tenant);
            next.run(req).await
        }
        Err(Error::TenantNotFound) => {
            warn!(host = %host, "Tenant not found");
            Error::TenantNotFound.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Validate the LMS bearer credential against the tenant's accepted keys.
pub async fn authenticate_lms(req: Request, next: Next) -> Response {
    let Some(tenant) = req.extensions().get::<Arc<TenantConfig>>().cloned() else {
        return Error::Internal("tenant not resolved".into()).into_response();
    };

    let Some(key) = bearer_credential(&req) else {
        return Error::Unauthenticated("Authorization required").into_response();
    };

    if !tenant.accepts_lms_key(key) {
        warn!(tenant_id = %tenant.tenant_id, "Invalid LMS API key");
        return Error::Unauthenticated("Invalid API key").into_response();
    }

    next.run(req).await
}

/// Verify the proxy token and attach the decoded claims.
pub async fn verify_token(mut req: Request, next: Next) -> Response {
    let Some(tenant) = req.extensions().get::<Arc<TenantConfig>>().cloned() else {
        return Error::Internal("tenant not resolved".into()).into_response();
    };

    let Some(raw) = bearer_credential(&req) else {
        return Error::Unauthenticated("Authorization required").into_response();
    };

    match token::verify(raw, &tenant) {
        Ok(claims) => {
            req.extensions_mut().insert(Arc::new(claims));
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Guard admin routes with the configured admin bearer token.
///
/// Without a configured token the endpoints stay disabled rather than open.
pub async fn authenticate_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    use subtle::ConstantTimeEq;

    let Some(ref admin_token) = state.admin_token else {
        return (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(serde_json::json!({
                "error": "Admin token not configured"
            })),
        )
            .into_response();
    };

    let authorized = bearer_credential(&req)
        .is_some_and(|t| bool::from(t.as_bytes().ct_eq(admin_token.as_bytes())));

    if !authorized {
        warn!("Invalid admin token");
        return Error::Unauthenticated("Invalid admin token").into_response();
    }

    next.run(req).await
}

/// Hostname the request was addressed to, without the port.
fn request_hostname(req: &Request) -> Option<String> {
    let raw = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().host())?;
    Some(strip_port(raw).to_string())
}

/// Drop a trailing `:port`, leaving bracketed IPv6 literals intact.
fn strip_port(host: &str) -> &str {
    if let Some(end) = host.strip_prefix('[').and_then(|h| h.find(']')) {
        return &host[1..=end];
    }
    host.split(':').next().unwrap_or(host)
}

/// Extract the credential from `Authorization: Bearer <credential>`.
fn bearer_credential(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
}
