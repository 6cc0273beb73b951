//! Route table and middleware composition.

use std::sync::Arc;

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::forward::Forwarder;
use super::handlers;
use super::middleware::{authenticate_admin, authenticate_lms, resolve_tenant, verify_token};
use crate::tenant::TenantStore;

/// Shared application state.
pub struct AppState {
    /// Tenant registry.
    pub tenants: Arc<dyn TenantStore>,
    /// Upstream forwarder (shared client).
    pub forwarder: Forwarder,
    /// Admin bearer token; admin endpoints answer 503 when unset.
    pub admin_token: Option<String>,
    /// Inbound body cap in bytes.
    pub max_body_size: usize,
}

/// Build the router.
///
/// Middleware per route group, outermost first: logging and CORS at the
/// edge, then tenant resolution, then the group's authenticator, then the
/// handler (which runs the evaluator before forwarding).
pub fn create_router(state: Arc<AppState>) -> Router {
    let lms_facing = Router::new()
        .route("/auth/token", post(handlers::issue_token))
        .route_layer(middleware::from_fn(authenticate_lms));

    let content_facing = Router::new()
        .route(
            "/xapi/statements",
            post(handlers::statements_write)
                .put(handlers::statements_write)
                .get(handlers::statements_read),
        )
        .route(
            "/xapi/activities/state",
            post(handlers::state_access)
                .put(handlers::state_access)
                .get(handlers::state_access)
                .delete(handlers::state_access),
        )
        .route(
            "/xapi/activities/profile",
            post(handlers::activity_profile)
                .put(handlers::activity_profile)
                .get(handlers::activity_profile)
                .delete(handlers::activity_profile),
        )
        .route(
            "/xapi/agents/profile",
            post(handlers::agent_profile)
                .put(handlers::agent_profile)
                .get(handlers::agent_profile)
                .delete(handlers::agent_profile),
        )
        .route_layer(middleware::from_fn(verify_token));

    // /xapi/about needs a tenant but no token; the LRS describes itself.
    let tenant_scoped = Router::new()
        .merge(lms_facing)
        .merge(content_facing)
        .route("/xapi/about", get(handlers::about))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            resolve_tenant,
        ));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .merge(tenant_scoped);

    // Admin surface exists only when the registry carries the capability.
    if state.tenants.admin().is_some() {
        let admin = Router::new()
            .route(
                "/admin/tenants",
                post(handlers::create_tenant).get(handlers::list_tenants),
            )
            .route(
                "/admin/tenants/{id}",
                get(handlers::get_tenant)
                    .put(handlers::update_tenant)
                    .delete(handlers::delete_tenant),
            )
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                authenticate_admin,
            ));
        router = router.merge(admin);
    }

    router
        .layer(CatchPanicLayer::new())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive CORS for browser-hosted content; preflights answer at the edge.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static("x-experience-api-version")])
}

// Route handlers and their middleware are exercised end-to-end in
// tests/proxy_tests.rs against a mock LRS.
