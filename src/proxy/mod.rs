//! HTTP surface of the proxy.
//!
//! Request path for content: listener → tenant resolver → token verifier →
//! route dispatch → permission evaluator → forwarder → upstream → response
//! streaming. For an LMS token request: listener → tenant resolver → LMS
//! authenticator → issuer.

pub mod forward;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use forward::Forwarder;
pub use router::{create_router, AppState};
pub use server::AuthProxy;
