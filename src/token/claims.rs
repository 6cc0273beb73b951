//! Token payload types: scopes, permissions, claims, and the token
//! request/response bodies exchanged with the LMS.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Actor, Group};

/// cmi5 permission scope carried in a token.
///
/// The scope set is closed at issuance time, but decoding is lenient: a token
/// minted with a scope this build does not know still parses (as [`Scope::Other`])
/// and the tenant policy decides whether it admits anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    /// `"false"`, no permission.
    Denied,
    /// Default cmi5 isolation: own statements for one activity and registration.
    ActorActivityRegistration,
    /// Own statements across a course, pinned to one registration.
    ActorCourseRegistration,
    /// Own statements for one activity across all registrations.
    ActorActivityAllRegistrations,
    /// Group statements for one activity and registration.
    GroupActivityRegistration,
    /// Own certification records across courses.
    ActorCrossCourseCertification,
    /// Aggregate course data (no evaluator branch defined).
    CourseAggregateOnly,
    /// Peer-shared course data (no evaluator branch defined).
    CoursePeerShared,
    /// Any scope name this build does not recognize.
    Other(String),
}

impl Scope {
    /// Canonical scope name on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Denied => "false",
            Self::ActorActivityRegistration => "actor-activity-registration-scoped",
            Self::ActorCourseRegistration => "actor-course-registration-scoped",
            Self::ActorActivityAllRegistrations => "actor-activity-all-registrations",
            Self::GroupActivityRegistration => "group-activity-registration-scoped",
            Self::ActorCrossCourseCertification => "actor-cross-course-certification",
            Self::CourseAggregateOnly => "course-aggregate-only",
            Self::CoursePeerShared => "course-peer-shared",
            Self::Other(name) => name,
        }
    }

    /// Whether this scope may appear in a token request at all.
    #[must_use]
    pub fn is_issuance_valid(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Whether this scope has write semantics. The course-level and
    /// cross-course scopes are read-only; requesting one as a write scope is
    /// rejected at issuance.
    #[must_use]
    pub fn is_write_capable(&self) -> bool {
        matches!(
            self,
            Self::Denied | Self::ActorActivityRegistration | Self::GroupActivityRegistration
        )
    }
}

impl From<String> for Scope {
    fn from(s: String) -> Self {
        match s.as_str() {
            "false" => Self::Denied,
            "actor-activity-registration-scoped" => Self::ActorActivityRegistration,
            "actor-course-registration-scoped" => Self::ActorCourseRegistration,
            "actor-activity-all-registrations" => Self::ActorActivityAllRegistrations,
            "group-activity-registration-scoped" => Self::GroupActivityRegistration,
            "actor-cross-course-certification" => Self::ActorCrossCourseCertification,
            "course-aggregate-only" => Self::CourseAggregateOnly,
            "course-peer-shared" => Self::CoursePeerShared,
            _ => Self::Other(s),
        }
    }
}

impl From<Scope> for String {
    fn from(s: Scope) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write and read scopes granted to a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permissions {
    /// Scope governing statement writes.
    pub write: Scope,
    /// Scope governing statement and state reads.
    pub read: Scope,
}

/// Payload of a signed proxy token.
///
/// Registered claims use their JWT names (`exp`, `iat`, `iss`, `sub`); the
/// rest is the authorization context the evaluator works from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Tenant the token was issued under; must match the resolved tenant at
    /// verification time.
    pub tenant_id: String,
    /// Learner the token authorizes.
    pub actor: Actor,
    /// Registration (session) the token is pinned to.
    pub registration: String,
    /// Activity IRI the token is pinned to.
    pub activity_id: String,
    /// Course identifier, when the LMS tracks one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    /// Granted scopes.
    pub permissions: Permissions,
    /// Authorized group for group scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    /// Opaque LMS metadata, echoed but never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Expiry (Unix seconds).
    pub exp: i64,
    /// Issued-at (Unix seconds).
    pub iat: i64,
    /// Issuer.
    pub iss: String,
    /// Subject: the actor's mbox, or empty when the actor has none.
    #[serde(default)]
    pub sub: String,
}

/// Body of `POST /auth/token`: the claims minus registered fields.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    /// Learner to authorize.
    pub actor: Actor,
    /// Registration to pin the token to.
    pub registration: String,
    /// Activity IRI to pin the token to.
    pub activity_id: String,
    /// Course identifier.
    #[serde(default)]
    pub course_id: Option<String>,
    /// Requested scopes.
    pub permissions: Permissions,
    /// Group for group scopes.
    #[serde(default)]
    pub group: Option<Group>,
    /// Opaque LMS metadata.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Response of `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Compact JWT string.
    pub token: String,
    /// Absolute expiry (RFC 3339).
    pub expires_at: DateTime<Utc>,
}
