//! Permission evaluator: pure predicates over decoded token claims.
//!
//! Maps `(claims, statement)` and `(claims, query parameters)` to an
//! admit/deny decision under the claims' cmi5 scope. No I/O, no clock, no
//! retries: every denial is an explicit value that the HTTP layer turns into
//! a 403 naming the mismatched field.
//!
//! | Scope | Write | Read (absent param = unconstrained) |
//! |-------|-------|-------------------------------------|
//! | `false` | never | never |
//! | `actor-activity-registration-scoped` | actor ∧ activity ∧ registration | agent ∧ activity ∧ registration |
//! | `actor-course-registration-scoped` | — | agent ∧ registration |
//! | `actor-activity-all-registrations` | — | agent ∧ activity |
//! | `group-activity-registration-scoped` | group actor ∧ membership ∧ activity ∧ registration | activity ∧ registration |
//! | `actor-cross-course-certification` | — | agent |
//!
//! Scopes with no branch here (including `course-aggregate-only` and
//! `course-peer-shared`) admit only under a `permissive` tenant policy.

use std::collections::HashMap;

use crate::model::{Actor, Statement};
use crate::tenant::Policy;
use crate::token::claims::{Scope, TokenClaims};

/// An explicit denial, carrying the reason sent back in the 403 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial(String);

impl Denial {
    fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// The denial reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decision result of a single evaluation.
pub type Decision = Result<(), Denial>;

/// Evaluates statements and queries against token claims.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator {
    policy: Policy,
}

impl PermissionEvaluator {
    /// Create an evaluator under the tenant's unknown-scope policy.
    #[must_use]
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    /// Whether a statement write is admissible under the claims' write scope.
    pub fn validate_write(&self, claims: &TokenClaims, stmt: &Statement) -> Decision {
        match &claims.permissions.write {
            Scope::Denied => Err(Denial::new("write permission denied")),
            Scope::ActorActivityRegistration => {
                self.check_actor_activity_registration(claims, stmt)
            }
            Scope::GroupActivityRegistration => {
                self.check_group_activity_registration(claims, stmt)
            }
            other => self.unknown_scope("write", other),
        }
    }

    /// Whether a statements query is admissible under the claims' read scope.
    ///
    /// `query` holds the first value of each query parameter; an absent
    /// parameter leaves that dimension unconstrained.
    pub fn validate_read(
        &self,
        claims: &TokenClaims,
        query: &HashMap<String, String>,
    ) -> Decision {
        let agent = query.get("agent").map(String::as_str).unwrap_or_default();
        let activity = query.get("activity").map(String::as_str).unwrap_or_default();
        let registration = query
            .get("registration")
            .map(String::as_str)
            .unwrap_or_default();

        match &claims.permissions.read {
            Scope::Denied => Err(Denial::new("read permission denied")),
            Scope::ActorActivityRegistration => {
                self.read_agent(claims, agent)?;
                self.read_activity(claims, activity)?;
                self.read_registration(claims, registration)
            }
            Scope::ActorCourseRegistration => {
                // Activity is free anywhere inside the course.
                self.read_agent(claims, agent)?;
                self.read_registration(claims, registration)
            }
            Scope::ActorActivityAllRegistrations => {
                // Any registration of the one activity.
                self.read_agent(claims, agent)?;
                self.read_activity(claims, activity)
            }
            Scope::GroupActivityRegistration => {
                self.read_activity(claims, activity)?;
                self.read_registration(claims, registration)
            }
            Scope::ActorCrossCourseCertification => self.read_agent(claims, agent),
            other => self.unknown_scope("read", other),
        }
    }

    /// Whether a state-document access is admissible.
    ///
    /// The agent parameter must identify the claims' actor; under the default
    /// isolation read scope the activity and registration must also match.
    pub fn validate_state_access(
        &self,
        claims: &TokenClaims,
        activity_id: &str,
        agent: &str,
        registration: &str,
    ) -> Decision {
        if !agent_identifies(agent, &claims.actor) {
            return Err(Denial::new("state access denied: agent mismatch"));
        }

        if claims.permissions.read == Scope::ActorActivityRegistration {
            if activity_id != claims.activity_id {
                return Err(Denial::new("state access denied: activity mismatch"));
            }
            if registration != claims.registration {
                return Err(Denial::new("state access denied: registration mismatch"));
            }
        }

        Ok(())
    }

    /// Whether an agent-profile access is admissible: the `agent` parameter
    /// must identify the claims' actor.
    pub fn validate_agent_access(&self, claims: &TokenClaims, agent: &str) -> Decision {
        if !agent_identifies(agent, &claims.actor) {
            return Err(Denial::new("profile access denied: agent mismatch"));
        }
        Ok(())
    }

    // ── Write predicates ──────────────────────────────────────────────────

    fn check_actor_activity_registration(
        &self,
        claims: &TokenClaims,
        stmt: &Statement,
    ) -> Decision {
        if !claims.actor.equals(&stmt.actor) {
            return Err(Denial::new("write denied: actor mismatch"));
        }
        self.write_activity(claims, stmt)?;
        self.write_registration(claims, stmt)
    }

    fn check_group_activity_registration(
        &self,
        claims: &TokenClaims,
        stmt: &Statement,
    ) -> Decision {
        if stmt.actor.object_type.as_deref() != Some("Group") {
            return Err(Denial::new("write denied: group actor required"));
        }

        // group = None fails closed even though issuance rejects that shape.
        let Some(group) = &claims.group else {
            return Err(Denial::new("write denied: group mismatch"));
        };
        if stmt.actor.name.as_deref() != Some(group.name.as_str()) {
            return Err(Denial::new("write denied: group mismatch"));
        }
        if !group.is_member(&claims.actor) {
            return Err(Denial::new("write denied: actor not a member of group"));
        }

        self.write_activity(claims, stmt)?;
        self.write_registration(claims, stmt)
    }

    fn write_activity(&self, claims: &TokenClaims, stmt: &Statement) -> Decision {
        if stmt.object.id != claims.activity_id {
            return Err(Denial::new(format!(
                "write denied: activity mismatch (expected {}, got {})",
                claims.activity_id, stmt.object.id
            )));
        }
        Ok(())
    }

    fn write_registration(&self, claims: &TokenClaims, stmt: &Statement) -> Decision {
        let registration = stmt
            .context
            .as_ref()
            .and_then(|c| c.registration.as_deref());
        if registration != Some(claims.registration.as_str()) {
            return Err(Denial::new(format!(
                "write denied: registration mismatch (expected {})",
                claims.registration
            )));
        }
        Ok(())
    }

    // ── Read predicates ───────────────────────────────────────────────────

    fn read_agent(&self, claims: &TokenClaims, agent: &str) -> Decision {
        if !agent.is_empty() && !agent_identifies(agent, &claims.actor) {
            return Err(Denial::new("read denied: agent mismatch"));
        }
        Ok(())
    }

    fn read_activity(&self, claims: &TokenClaims, activity: &str) -> Decision {
        if !activity.is_empty() && activity != claims.activity_id {
            return Err(Denial::new("read denied: activity mismatch"));
        }
        Ok(())
    }

    fn read_registration(&self, claims: &TokenClaims, registration: &str) -> Decision {
        if !registration.is_empty() && registration != claims.registration {
            return Err(Denial::new("read denied: registration mismatch"));
        }
        Ok(())
    }

    fn unknown_scope(&self, op: &str, scope: &Scope) -> Decision {
        match self.policy {
            Policy::Permissive => Ok(()),
            Policy::Strict => Err(Denial::new(format!(
                "unsupported {op} permission scope: {scope}"
            ))),
        }
    }
}

/// Whether the serialized `agent` query parameter identifies `actor`.
///
/// Parsed as xAPI JSON first, with actor equality applied; parameters that do
/// not parse fall back to a substring check over mbox/openid, which is how
/// opaque agent strings were historically matched.
fn agent_identifies(agent: &str, actor: &Actor) -> bool {
    if agent.is_empty() {
        return false;
    }

    if let Ok(parsed) = serde_json::from_str::<Actor>(agent) {
        return parsed.equals(actor);
    }

    let by_mbox = actor
        .mbox
        .as_deref()
        .is_some_and(|m| !m.is_empty() && agent.contains(m));
    let by_openid = actor
        .openid
        .as_deref()
        .is_some_and(|o| !o.is_empty() && agent.contains(o));
    by_mbox || by_openid
}
