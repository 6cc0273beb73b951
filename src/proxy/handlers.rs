//! HTTP handlers: token issuance, the xAPI proxy surface, and tenant admin.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Bytes},
    extract::{Path, Query, Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use tracing::warn;

use super::router::AppState;
use crate::authz::PermissionEvaluator;
use crate::model::Statement;
use crate::tenant::{CreateTenantRequest, TenantConfig};
use crate::token::{
    self,
    audit::{self, AuditEvent, RequestMeta},
    TokenClaims, TokenRequest, TokenResponse,
};
use crate::{Error, Result};

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /auth/token`: issue a proxy token to an authenticated LMS.
pub async fn issue_token(
    Extension(tenant): Extension<Arc<TenantConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let meta = RequestMeta::from_headers(&headers);

    let request: TokenRequest = serde_json::from_slice(&body)
        .map_err(|_| Error::MalformedRequest("Invalid request body".into()))?;

    let (token, expires_at) = match token::issue(&tenant, &request) {
        Ok(issued) => issued,
        Err(e) => {
            audit::emit(&AuditEvent::issue_denied(
                &tenant.tenant_id,
                e.to_string(),
                &meta,
            ));
            return Err(e);
        }
    };

    audit::emit(&AuditEvent::issued(&tenant.tenant_id, &request, &meta));
    tracing::info!(
        tenant_id = %tenant.tenant_id,
        actor = %request.actor.mbox.as_deref().unwrap_or_default(),
        registration = %request.registration,
        activity_id = %request.activity_id,
        "Token issued"
    );

    Ok(Json(TokenResponse { token, expires_at }).into_response())
}

/// `POST`/`PUT /xapi/statements`: validate every statement, then forward the
/// exact inbound bytes. The first denial fails the whole batch; nothing
/// reaches the LRS.
pub async fn statements_write(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<Arc<TenantConfig>>,
    Extension(claims): Extension<Arc<TokenClaims>>,
    req: Request,
) -> Result<Response> {
    let meta = RequestMeta::from_headers(req.headers());
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, state.max_body_size)
        .await
        .map_err(|_| Error::MalformedRequest("Failed to read body".into()))?;

    let statements = parse_statements(&bytes)?;
    let evaluator = PermissionEvaluator::new(tenant.policy);

    for (i, stmt) in statements.iter().enumerate() {
        if let Err(denial) = evaluator.validate_write(&claims, stmt) {
            warn!(
                tenant_id = %tenant.tenant_id,
                registration = %claims.registration,
                statement = i,
                reason = %denial,
                "Statement write denied"
            );
            let reason = format!("statement {i}: {denial}");
            audit::emit(&AuditEvent::decision(
                "statements.write",
                &claims,
                &meta,
                Some(reason.clone()),
            ));
            return Err(Error::Forbidden(reason));
        }
    }

    audit::emit(&AuditEvent::decision("statements.write", &claims, &meta, None));
    state
        .forwarder
        .forward(&tenant, parts.method, &parts.uri, &parts.headers, Some(bytes))
        .await
}

/// `GET /xapi/statements`: validate the query under the read scope, then
/// forward.
pub async fn statements_read(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<Arc<TenantConfig>>,
    Extension(claims): Extension<Arc<TokenClaims>>,
    Query(params): Query<HashMap<String, String>>,
    req: Request,
) -> Result<Response> {
    let meta = RequestMeta::from_headers(req.headers());
    let evaluator = PermissionEvaluator::new(tenant.policy);

    if let Err(denial) = evaluator.validate_read(&claims, &params) {
        warn!(
            tenant_id = %tenant.tenant_id,
            registration = %claims.registration,
            reason = %denial,
            "Statement read denied"
        );
        audit::emit(&AuditEvent::decision(
            "statements.read",
            &claims,
            &meta,
            Some(denial.to_string()),
        ));
        return Err(Error::Forbidden(denial.to_string()));
    }

    audit::emit(&AuditEvent::decision("statements.read", &claims, &meta, None));
    forward_without_validation(&state, &tenant, req).await
}

/// `/xapi/activities/state`: state-document access under the actor scoping.
pub async fn state_access(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<Arc<TenantConfig>>,
    Extension(claims): Extension<Arc<TokenClaims>>,
    Query(params): Query<HashMap<String, String>>,
    req: Request,
) -> Result<Response> {
    let meta = RequestMeta::from_headers(req.headers());
    let evaluator = PermissionEvaluator::new(tenant.policy);

    let activity_id = params.get("activityId").map(String::as_str).unwrap_or_default();
    let agent = params.get("agent").map(String::as_str).unwrap_or_default();
    let registration = params
        .get("registration")
        .map(String::as_str)
        .unwrap_or_default();

    if let Err(denial) = evaluator.validate_state_access(&claims, activity_id, agent, registration)
    {
        warn!(tenant_id = %tenant.tenant_id, reason = %denial, "State access denied");
        audit::emit(&AuditEvent::decision(
            "state.access",
            &claims,
            &meta,
            Some(denial.to_string()),
        ));
        return Err(Error::Forbidden(denial.to_string()));
    }

    audit::emit(&AuditEvent::decision("state.access", &claims, &meta, None));
    forward_without_validation(&state, &tenant, req).await
}

/// `/xapi/activities/profile`: forwarded under a verified token. The
/// evaluator defines no activity-profile operation, so the claims gate access
/// and the document passes through.
pub async fn activity_profile(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<Arc<TenantConfig>>,
    req: Request,
) -> Result<Response> {
    forward_without_validation(&state, &tenant, req).await
}

/// `/xapi/agents/profile`: the `agent` parameter must identify the token's
/// actor.
pub async fn agent_profile(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<Arc<TenantConfig>>,
    Extension(claims): Extension<Arc<TokenClaims>>,
    Query(params): Query<HashMap<String, String>>,
    req: Request,
) -> Result<Response> {
    let meta = RequestMeta::from_headers(req.headers());
    let evaluator = PermissionEvaluator::new(tenant.policy);

    let agent = params.get("agent").map(String::as_str).unwrap_or_default();
    if let Err(denial) = evaluator.validate_agent_access(&claims, agent) {
        warn!(tenant_id = %tenant.tenant_id, reason = %denial, "Agent profile access denied");
        audit::emit(&AuditEvent::decision(
            "profile.agent",
            &claims,
            &meta,
            Some(denial.to_string()),
        ));
        return Err(Error::Forbidden(denial.to_string()));
    }

    audit::emit(&AuditEvent::decision("profile.agent", &claims, &meta, None));
    forward_without_validation(&state, &tenant, req).await
}

/// `GET /xapi/about`: tenant-scoped but tokenless; the LRS answers.
pub async fn about(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<Arc<TenantConfig>>,
    req: Request,
) -> Result<Response> {
    forward_without_validation(&state, &tenant, req).await
}

// ── Admin ─────────────────────────────────────────────────────────────────

/// `POST /admin/tenants`
pub async fn create_tenant(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let admin = state.tenants.admin().ok_or(Error::AdminUnavailable)?;

    let request: CreateTenantRequest = serde_json::from_slice(&body)
        .map_err(|_| Error::MalformedRequest("Invalid request body".into()))?;
    admin.create(request).await?;

    Ok((StatusCode::CREATED, Json(json!({"status": "created"}))).into_response())
}

/// `GET /admin/tenants`
pub async fn list_tenants(State(state): State<Arc<AppState>>) -> Result<Response> {
    let admin = state.tenants.admin().ok_or(Error::AdminUnavailable)?;
    let tenants = admin.list().await?;
    Ok(Json(json!({ "tenants": tenants })).into_response())
}

/// `GET /admin/tenants/{id}`: secrets are redacted by the serialized form.
pub async fn get_tenant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response> {
    let tenant = state.tenants.resolve_by_id(&id).await?;
    Ok(Json(&*tenant).into_response())
}

/// `PUT /admin/tenants/{id}`
pub async fn update_tenant() -> Result<Response> {
    Err(Error::NotImplemented)
}

/// `DELETE /admin/tenants/{id}`
pub async fn delete_tenant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response> {
    let admin = state.tenants.admin().ok_or(Error::AdminUnavailable)?;
    admin.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Forward a request whose authorization has already been decided. POST/PUT
/// bodies are buffered and replayed byte-for-byte; GET/DELETE send none.
async fn forward_without_validation(
    state: &AppState,
    tenant: &TenantConfig,
    req: Request,
) -> Result<Response> {
    let (parts, body) = req.into_parts();

    let bytes = if parts.method == Method::POST || parts.method == Method::PUT {
        Some(
            to_bytes(body, state.max_body_size)
                .await
                .map_err(|_| Error::MalformedRequest("Failed to read body".into()))?,
        )
    } else {
        None
    };

    state
        .forwarder
        .forward(tenant, parts.method, &parts.uri, &parts.headers, bytes)
        .await
}

/// Parse a statement batch: a JSON array, or a single statement object.
fn parse_statements(bytes: &[u8]) -> Result<Vec<Statement>> {
    if let Ok(batch) = serde_json::from_slice::<Vec<Statement>>(bytes) {
        return Ok(batch);
    }
    serde_json::from_slice::<Statement>(bytes)
        .map(|stmt| vec![stmt])
        .map_err(|_| Error::MalformedRequest("Invalid statement format".into()))
}
