//! xAPI data model used for authorization decisions.
//!
//! Only the fields the permission evaluator looks at are modeled; everything
//! else in a statement passes through the proxy as raw bytes. Serde names
//! follow the xAPI 1.0.3 wire form (`objectType`, `mbox_sha1sum`, `homePage`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An xAPI actor (Agent or Group reference).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    /// `"Agent"` or `"Group"`.
    #[serde(rename = "objectType", skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `mailto:` IRI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbox: Option<String>,
    /// SHA1 of the mailto IRI.
    #[serde(rename = "mbox_sha1sum", skip_serializing_if = "Option::is_none")]
    pub mbox_sha1sum: Option<String>,
    /// OpenID URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openid: Option<String>,
    /// Account on some system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
}

/// An xAPI account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Canonical home page of the system the account lives on.
    #[serde(rename = "homePage")]
    pub home_page: String,
    /// Account name unique within the home page.
    pub name: String,
}

impl Actor {
    /// xAPI actor equality: the first inverse-functional identifier populated
    /// on BOTH sides decides, in order mbox, mbox_sha1sum, openid, account.
    /// No pair populated on both sides means the actors are not comparable
    /// and therefore unequal.
    #[must_use]
    pub fn equals(&self, other: &Actor) -> bool {
        if let (Some(a), Some(b)) = (&self.mbox, &other.mbox) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.mbox_sha1sum, &other.mbox_sha1sum) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.openid, &other.openid) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.account, &other.account) {
            return a == b;
        }
        false
    }

    /// Whether the actor carries at least one inverse-functional identifier.
    #[must_use]
    pub fn has_identifier(&self) -> bool {
        self.mbox.is_some()
            || self.mbox_sha1sum.is_some()
            || self.openid.is_some()
            || self.account.is_some()
    }
}

/// An xAPI group actor with an enumerated member list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Must be `"Group"`.
    #[serde(rename = "objectType")]
    pub object_type: String,
    /// Group name.
    pub name: String,
    /// Group members.
    #[serde(default)]
    pub member: Vec<Actor>,
}

impl Group {
    /// Membership test under actor equality.
    #[must_use]
    pub fn is_member(&self, actor: &Actor) -> bool {
        self.member.iter().any(|m| m.equals(actor))
    }
}

/// An xAPI statement, reduced to the fields authorization inspects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    /// Statement UUID (client-assigned).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Who performed the action.
    pub actor: Actor,
    /// What was done.
    pub verb: Verb,
    /// What it was done to.
    pub object: StatementObject,
    /// Launch context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<StatementContext>,
    /// Outcome, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// An xAPI verb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verb {
    /// Verb IRI.
    pub id: String,
    /// Language-mapped display strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<HashMap<String, String>>,
}

/// An xAPI statement object (activity, in the cases the proxy authorizes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementObject {
    /// `"Activity"` when present.
    #[serde(rename = "objectType", skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    /// Activity IRI.
    pub id: String,
    /// Activity definition, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<Value>,
}

/// An xAPI statement context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementContext {
    /// Registration (session) identifier assigned by the LMS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    /// Instructor actor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<Actor>,
    /// Team group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<Group>,
    /// Context extensions, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mbox_actor(mbox: &str) -> Actor {
        Actor {
            mbox: Some(mbox.to_string()),
            ..Actor::default()
        }
    }

    #[test]
    fn equality_by_mbox() {
        let a = mbox_actor("mailto:a@x");
        let b = mbox_actor("mailto:a@x");
        let c = mbox_actor("mailto:c@x");

        assert!(a.equals(&b));
        assert!(!a.equals(&c));
    }

    #[test]
    fn mbox_decides_before_later_identifiers() {
        // Both sides populate mbox, so the differing openid is never consulted.
        let a = Actor {
            mbox: Some("mailto:a@x".into()),
            openid: Some("https://id.example/a".into()),
            ..Actor::default()
        };
        let b = Actor {
            mbox: Some("mailto:a@x".into()),
            openid: Some("https://id.example/other".into()),
            ..Actor::default()
        };

        assert!(a.equals(&b));
    }

    #[test]
    fn falls_through_to_first_shared_identifier() {
        // Only one side has an mbox; the shared pair is openid.
        let a = Actor {
            mbox: Some("mailto:a@x".into()),
            openid: Some("https://id.example/a".into()),
            ..Actor::default()
        };
        let b = Actor {
            openid: Some("https://id.example/a".into()),
            ..Actor::default()
        };

        assert!(a.equals(&b));
    }

    #[test]
    fn equality_by_account() {
        let acct = |home: &str, name: &str| Actor {
            account: Some(Account {
                home_page: home.to_string(),
                name: name.to_string(),
            }),
            ..Actor::default()
        };

        assert!(acct("https://lms.example", "alice").equals(&acct("https://lms.example", "alice")));
        assert!(!acct("https://lms.example", "alice").equals(&acct("https://lms.example", "bob")));
        assert!(!acct("https://lms.example", "alice").equals(&acct("https://other.example", "alice")));
    }

    #[test]
    fn no_shared_identifier_is_unequal() {
        let a = mbox_actor("mailto:a@x");
        let b = Actor {
            openid: Some("https://id.example/a".into()),
            ..Actor::default()
        };

        assert!(!a.equals(&b));
        assert!(!Actor::default().equals(&Actor::default()));
    }

    #[test]
    fn group_membership_uses_actor_equality() {
        let group = Group {
            object_type: "Group".into(),
            name: "team-1".into(),
            member: vec![mbox_actor("mailto:a@x"), mbox_actor("mailto:b@x")],
        };

        assert!(group.is_member(&mbox_actor("mailto:a@x")));
        assert!(!group.is_member(&mbox_actor("mailto:z@x")));
    }

    #[test]
    fn statement_parses_from_xapi_wire_form() {
        let json = r#"{
            "actor": {"objectType": "Agent", "mbox": "mailto:a@x"},
            "verb": {"id": "http://adlnet.gov/expapi/verbs/completed"},
            "object": {"id": "https://ex/a"},
            "context": {"registration": "R1"}
        }"#;

        let stmt: Statement = serde_json::from_str(json).unwrap();
        assert_eq!(stmt.actor.mbox.as_deref(), Some("mailto:a@x"));
        assert_eq!(stmt.object.id, "https://ex/a");
        assert_eq!(
            stmt.context.unwrap().registration.as_deref(),
            Some("R1")
        );
    }

    #[test]
    fn has_identifier_rejects_bare_names() {
        let named = Actor {
            name: Some("Alice".into()),
            ..Actor::default()
        };
        assert!(!named.has_identifier());
        assert!(mbox_actor("mailto:a@x").has_identifier());
    }
}
