//! Multi-tenant isolation: host routing, cross-tenant token binding, and the
//! admin surface over the dynamic registry.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::Request,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    Json, Router,
};
use dashmap::DashMap;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use xapi_lrs_auth_proxy::{
    proxy::{create_router, AppState, Forwarder},
    tenant::{
        CreateTenantRequest, DynamicTenantStore, Policy, TenantBackend, TenantConfig, TenantStore,
    },
    Result,
};

const ADMIN_TOKEN: &str = "admin-secret";

/// In-memory stand-in for the external tenant store.
#[derive(Default)]
struct InMemoryBackend {
    hosts: DashMap<String, String>,
    tenants: DashMap<String, TenantConfig>,
}

impl InMemoryBackend {
    fn add(&self, tenant: TenantConfig) {
        for host in &tenant.hosts {
            self.hosts.insert(host.clone(), tenant.tenant_id.clone());
        }
        self.tenants.insert(tenant.tenant_id.clone(), tenant);
    }
}

#[async_trait::async_trait]
impl TenantBackend for InMemoryBackend {
    async fn tenant_id_for_host(&self, host: &str) -> Result<Option<String>> {
        Ok(self.hosts.get(host).map(|id| id.clone()))
    }

    async fn load(&self, tenant_id: &str) -> Result<Option<TenantConfig>> {
        Ok(self.tenants.get(tenant_id).map(|t| t.clone()))
    }

    async fn create(&self, req: &CreateTenantRequest) -> Result<()> {
        self.add(TenantConfig {
            tenant_id: req.tenant_id.clone(),
            hosts: req.hosts.clone(),
            lrs_endpoint: req.lrs.endpoint.clone(),
            lrs_username: req.lrs.username.clone(),
            lrs_password: req.lrs.password.clone(),
            signing_key: req.auth.signing_key.as_bytes().to_vec(),
            token_ttl_seconds: req.auth.token_ttl_seconds,
            lms_keys: req
                .auth
                .lms_keys
                .iter()
                .map(|k| xapi_lrs_auth_proxy::tenant::digest_lms_key(k))
                .collect(),
            policy: req.auth.policy,
        });
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.tenants.iter().map(|t| t.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, tenant_id: &str) -> Result<bool> {
        self.hosts.retain(|_, id| id.as_str() != tenant_id);
        Ok(self.tenants.remove(tenant_id).is_some())
    }
}

fn tenant(id: &str, host: &str, signing_key: &str, lms_key: &str, endpoint: &str) -> TenantConfig {
    TenantConfig {
        tenant_id: id.into(),
        hosts: vec![host.into()],
        lrs_endpoint: endpoint.into(),
        lrs_username: format!("{id}-user"),
        lrs_password: format!("{id}-pass"),
        signing_key: signing_key.as_bytes().to_vec(),
        token_ttl_seconds: 3600,
        lms_keys: std::iter::once(lms_key.to_string()).collect(),
        policy: Policy::Strict,
    }
}

async fn spawn_mock_lrs() -> (String, Arc<Mutex<usize>>) {
    let hits = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&hits);

    async fn handle(
        axum::extract::State(counter): axum::extract::State<Arc<Mutex<usize>>>,
    ) -> impl IntoResponse {
        *counter.lock().unwrap() += 1;
        Json(json!({"stored": true}))
    }

    let app = Router::new().fallback(handle).with_state(counter);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/xapi"), hits)
}

/// Two-tenant app over an in-memory backend.
async fn multi_tenant_app() -> (Router, Arc<Mutex<usize>>) {
    let (endpoint, hits) = spawn_mock_lrs().await;

    let backend = InMemoryBackend::default();
    backend.add(tenant(
        "acme",
        "lrs.acme.example",
        "0123456789abcdef0123456789abcdef",
        "acme-lms-key",
        &endpoint,
    ));
    backend.add(tenant(
        "globex",
        "lrs.globex.example",
        "fedcba9876543210fedcba9876543210",
        "globex-lms-key",
        &endpoint,
    ));

    let tenants: Arc<dyn TenantStore> =
        Arc::new(DynamicTenantStore::new(Arc::new(backend)));
    let state = Arc::new(AppState {
        tenants,
        forwarder: Forwarder::new(std::time::Duration::from_secs(30)).unwrap(),
        admin_token: Some(ADMIN_TOKEN.into()),
        max_body_size: 10 * 1024 * 1024,
    });

    (create_router(state), hits)
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn obtain_token(app: &Router, host: &str, lms_key: &str) -> String {
    let body = json!({
        "actor": {"objectType": "Agent", "mbox": "mailto:a@x"},
        "registration": "R1",
        "activity_id": "https://ex/a",
        "permissions": {
            "write": "actor-activity-registration-scoped",
            "read": "actor-activity-registration-scoped"
        }
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/token")
                .header(header::HOST, host)
                .header(header::AUTHORIZATION, format!("Bearer {lms_key}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

fn statements_get(host: &str, token: &str) -> Request {
    Request::builder()
        .method(Method::GET)
        .uri("/xapi/statements")
        .header(header::HOST, host)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn hosts_route_to_their_tenants() {
    let (app, hits) = multi_tenant_app().await;

    let acme_token = obtain_token(&app, "lrs.acme.example", "acme-lms-key").await;
    let response = app
        .clone()
        .oneshot(statements_get("lrs.acme.example", &acme_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*hits.lock().unwrap(), 1);

    // The host header also selects the LMS key set.
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/token")
                .header(header::HOST, "lrs.globex.example")
                .header(header::AUTHORIZATION, "Bearer acme-lms-key")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_host_is_404() {
    let (app, _) = multi_tenant_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/xapi/about")
                .header(header::HOST, "nobody.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn token_issued_by_one_tenant_is_rejected_by_the_other() {
    let (app, hits) = multi_tenant_app().await;

    let acme_token = obtain_token(&app, "lrs.acme.example", "acme-lms-key").await;

    let response = app
        .clone()
        .oneshot(statements_get("lrs.globex.example", &acme_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(*hits.lock().unwrap(), 0, "no upstream call on rejection");

    // Still valid where it was issued.
    let response = app
        .oneshot(statements_get("lrs.acme.example", &acme_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ── Admin surface ─────────────────────────────────────────────────────────

fn admin_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    match body {
        Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn admin_requires_the_configured_token() {
    let (app, _) = multi_tenant_app().await;

    let response = app
        .clone()
        .oneshot(admin_request(Method::GET, "/admin/tenants", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(admin_request(
            Method::GET,
            "/admin/tenants",
            Some("wrong"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(admin_request(
            Method::GET,
            "/admin/tenants",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["tenants"], json!(["acme", "globex"]));
}

#[tokio::test]
async fn tenant_lifecycle_over_the_admin_api() {
    let (app, _) = multi_tenant_app().await;

    let create = json!({
        "tenant_id": "initech",
        "hosts": ["lrs.initech.example"],
        "lrs": {
            "endpoint": "https://lrs.initech.example/xapi",
            "username": "proxy",
            "password": "secret"
        },
        "auth": {
            "signing_key": "abcdefabcdefabcdefabcdefabcdefab",
            "lms_keys": ["initech-lms-key"],
            "policy": "permissive"
        }
    });
    let response = app
        .clone()
        .oneshot(admin_request(
            Method::POST,
            "/admin/tenants",
            Some(ADMIN_TOKEN),
            Some(create),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // The created tenant is issued against immediately, with the raw key
    // checked against its stored digest.
    let token = obtain_token(&app, "lrs.initech.example", "initech-lms-key").await;
    assert!(!token.is_empty());

    // Admin GET exposes routing data but never secrets.
    let response = app
        .clone()
        .oneshot(admin_request(
            Method::GET,
            "/admin/tenants/initech",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["tenant_id"], "initech");
    assert_eq!(body["policy"], "permissive");
    assert!(body.get("signing_key").is_none());
    assert!(body.get("lrs_password").is_none());

    // Updates are not implemented.
    let response = app
        .clone()
        .oneshot(admin_request(
            Method::PUT,
            "/admin/tenants/initech",
            Some(ADMIN_TOKEN),
            Some(json!({})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    // Delete, then the host stops resolving.
    let response = app
        .clone()
        .oneshot(admin_request(
            Method::DELETE,
            "/admin/tenants/initech",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/xapi/about")
                .header(header::HOST, "lrs.initech.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
