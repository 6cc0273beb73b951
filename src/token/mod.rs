//! Token issuance and verification.
//!
//! The LMS trades its long-lived API key for a short-lived HS256 JWT scoped
//! to one learner, activity, and registration (`POST /auth/token`); content
//! then presents that token on every xAPI call. Verification re-checks the
//! signature under the resolved tenant's key, so a token never crosses
//! tenant boundaries even when two tenants share a deployment.

pub mod audit;
pub mod claims;
pub mod issuer;
pub mod verifier;

pub use audit::{AuditEvent, RequestMeta};
pub use claims::{Permissions, Scope, TokenClaims, TokenRequest, TokenResponse};
pub use issuer::{issue, ISSUER};
pub use verifier::verify;
