//! xAPI LRS Auth Proxy
//!
//! An authentication and authorization proxy between learning content and a
//! Learning Record Store. Long-lived shared secrets stay on the LMS side;
//! content receives short-lived HS256 tokens scoped to one learner, activity,
//! and registration, and every xAPI request is checked against the cmi5
//! permission model before being forwarded upstream with the tenant's LRS
//! credentials.
//!
//! # Pipeline
//!
//! ```text
//! content request
//!   -> tenant resolver   (Host header -> TenantConfig)
//!   -> token verifier    (HS256 signature, expiry, tenant binding)
//!   -> permission evaluator (scope predicates over the statement/query)
//!   -> forwarder         (credential swap, byte-faithful relay)
//! ```
//!
//! Tenants are isolated end to end: distinct hosts, signing keys, upstream
//! credentials, and LMS keys. A token issued by one tenant is rejected by
//! every other.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authz;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod proxy;
pub mod tenant;
pub mod token;

pub use error::{Error, Result};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// xAPI protocol version spoken toward the LRS.
pub const XAPI_VERSION: &str = "1.0.3";

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
