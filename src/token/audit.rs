//! Structured audit events for token issuance and authorization decisions.
//!
//! Events are emitted through `tracing::info!` with the serialized record in
//! the `audit` field, so any log aggregator can filter and index them. The
//! sink is external; a serialization failure logs a warning and never fails
//! the request being audited.

use std::net::IpAddr;

use axum::http::HeaderMap;
use serde::Serialize;

use super::claims::{TokenClaims, TokenRequest};

/// One audit record, mirroring the columns of the deployment's audit store.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Operation name (`token.issue`, `statements.write`, ...).
    pub operation: &'static str,
    /// Tenant the request resolved to.
    pub tenant_id: String,
    /// Acting learner (mbox or openid), when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Registration from the authorization context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    /// Activity from the authorization context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    /// Granted scopes, `write:<scope> read:<scope>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    /// Whether the operation was admitted.
    pub success: bool,
    /// Denial reason, when not admitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Client IP (from forwarding headers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
    /// Client User-Agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Client metadata lifted from request headers for auditing.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Client IP from `X-Forwarded-For` / `X-Real-IP`.
    pub client_ip: Option<IpAddr>,
    /// `User-Agent` header value.
    pub user_agent: Option<String>,
}

impl RequestMeta {
    /// Extract client metadata from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let client_ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|s| s.trim().parse().ok())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse().ok())
            });

        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self {
            client_ip,
            user_agent,
        }
    }
}

impl AuditEvent {
    /// Build an event for an authorization decision under decoded claims.
    #[must_use]
    pub fn decision(
        operation: &'static str,
        claims: &TokenClaims,
        meta: &RequestMeta,
        error: Option<String>,
    ) -> Self {
        Self {
            operation,
            tenant_id: claims.tenant_id.clone(),
            actor: claims
                .actor
                .mbox
                .clone()
                .or_else(|| claims.actor.openid.clone()),
            registration: Some(claims.registration.clone()),
            activity_id: Some(claims.activity_id.clone()),
            permissions: Some(format!(
                "write:{} read:{}",
                claims.permissions.write, claims.permissions.read
            )),
            success: error.is_none(),
            error,
            client_ip: meta.client_ip,
            user_agent: meta.user_agent.clone(),
        }
    }

    /// Build a `token.issue` event for a minted token.
    #[must_use]
    pub fn issued(tenant_id: &str, req: &TokenRequest, meta: &RequestMeta) -> Self {
        Self {
            operation: "token.issue",
            tenant_id: tenant_id.to_string(),
            actor: req.actor.mbox.clone().or_else(|| req.actor.openid.clone()),
            registration: Some(req.registration.clone()),
            activity_id: Some(req.activity_id.clone()),
            permissions: Some(format!(
                "write:{} read:{}",
                req.permissions.write, req.permissions.read
            )),
            success: true,
            error: None,
            client_ip: meta.client_ip,
            user_agent: meta.user_agent.clone(),
        }
    }

    /// Build a `token.issue` event for a rejected request.
    #[must_use]
    pub fn issue_denied(tenant_id: &str, reason: String, meta: &RequestMeta) -> Self {
        Self {
            operation: "token.issue",
            tenant_id: tenant_id.to_string(),
            actor: None,
            registration: None,
            activity_id: None,
            permissions: None,
            success: false,
            error: Some(reason),
            client_ip: meta.client_ip,
            user_agent: meta.user_agent.clone(),
        }
    }
}

/// Emit an audit event.
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Actor;
    use crate::token::claims::{Permissions, Scope};

    fn claims() -> TokenClaims {
        TokenClaims {
            tenant_id: "acme".into(),
            actor: Actor {
                mbox: Some("mailto:a@x".into()),
                ..Actor::default()
            },
            registration: "R1".into(),
            activity_id: "https://ex/a".into(),
            course_id: None,
            permissions: Permissions {
                write: Scope::ActorActivityRegistration,
                read: Scope::ActorCourseRegistration,
            },
            group: None,
            metadata: None,
            exp: 1_800_000_000,
            iat: 1_799_996_400,
            iss: "xapi-lrs-auth-proxy".into(),
            sub: "mailto:a@x".into(),
        }
    }

    #[test]
    fn admitted_decision_has_no_error() {
        let ev = AuditEvent::decision("statements.write", &claims(), &RequestMeta::default(), None);
        assert!(ev.success);
        assert!(ev.error.is_none());
        assert_eq!(ev.actor.as_deref(), Some("mailto:a@x"));
        assert_eq!(
            ev.permissions.as_deref(),
            Some("write:actor-activity-registration-scoped read:actor-course-registration-scoped")
        );
    }

    #[test]
    fn denied_decision_carries_reason() {
        let ev = AuditEvent::decision(
            "statements.write",
            &claims(),
            &RequestMeta::default(),
            Some("write denied: actor mismatch".into()),
        );
        assert!(!ev.success);
        assert_eq!(ev.error.as_deref(), Some("write denied: actor mismatch"));
    }

    #[test]
    fn request_meta_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.7".parse().unwrap());
        headers.insert("user-agent", "scorm-player/2.1".parse().unwrap());

        let meta = RequestMeta::from_headers(&headers);
        assert_eq!(meta.client_ip.unwrap().to_string(), "203.0.113.9");
        assert_eq!(meta.user_agent.as_deref(), Some("scorm-player/2.1"));
    }

    fn token_request() -> TokenRequest {
        TokenRequest {
            actor: Actor {
                mbox: Some("mailto:a@x".into()),
                ..Actor::default()
            },
            registration: "R1".into(),
            activity_id: "https://ex/a".into(),
            course_id: None,
            permissions: Permissions {
                write: Scope::ActorActivityRegistration,
                read: Scope::ActorActivityRegistration,
            },
            group: None,
            metadata: None,
        }
    }

    #[test]
    fn issuance_event_reflects_the_request() {
        let ev = AuditEvent::issued("acme", &token_request(), &RequestMeta::default());
        assert_eq!(ev.operation, "token.issue");
        assert!(ev.success);
        assert_eq!(ev.actor.as_deref(), Some("mailto:a@x"));
        assert_eq!(ev.registration.as_deref(), Some("R1"));
    }

    #[test]
    fn events_serialize() {
        let meta = RequestMeta::default();
        for ev in [
            AuditEvent::issued("acme", &token_request(), &meta),
            AuditEvent::issue_denied("acme", "invalid scope".into(), &meta),
            AuditEvent::decision("state.access", &claims(), &meta, Some("agent mismatch".into())),
        ] {
            assert!(serde_json::to_string(&ev).is_ok());
        }
    }

    #[test]
    fn emit_does_not_panic() {
        emit(&AuditEvent::issued("acme", &token_request(), &RequestMeta::default()));
    }
}
