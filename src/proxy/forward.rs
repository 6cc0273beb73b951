//! Upstream forwarder: credential substitution and byte-faithful relay.
//!
//! Admitted requests are replayed against the tenant's LRS with the proxy's
//! `/xapi` prefix stripped, the inbound `Authorization` replaced by the
//! tenant's Basic credentials, and the body forwarded exactly as validated.
//! Responses stream back without buffering. The forwarder never re-signs,
//! re-orders, or otherwise alters statements.

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderValue, Method, Uri},
    response::Response,
};
use tracing::{debug, warn};

use crate::tenant::TenantConfig;
use crate::{Error, Result, XAPI_VERSION};

const XAPI_VERSION_HEADER: &str = "x-experience-api-version";

/// Inbound path prefix owned by the proxy.
const XAPI_PREFIX: &str = "/xapi";

// Credentials are replaced, and framing is re-derived from the body we
// actually send, so none of these cross the proxy.
const SKIPPED_REQUEST_HEADERS: [&str; 5] = [
    "authorization",
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
];

const SKIPPED_RESPONSE_HEADERS: [&str; 2] = ["transfer-encoding", "connection"];

/// Shared upstream HTTP client. One instance serves every tenant; reqwest
/// pools connections per endpoint.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    /// Build the shared client with the upstream call timeout.
    pub fn new(timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build upstream client: {e}")))?;
        Ok(Self { client })
    }

    /// Relay an admitted request to the tenant's LRS and stream the response
    /// back. `body` carries the exact bytes consumed during validation;
    /// `None` for bodyless methods.
    pub async fn forward(
        &self,
        tenant: &TenantConfig,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Response> {
        let url = upstream_url(&tenant.lrs_endpoint, uri.path(), uri.query());

        let mut upstream_headers = filter_headers(headers, &SKIPPED_REQUEST_HEADERS);
        if !upstream_headers.contains_key(XAPI_VERSION_HEADER) {
            upstream_headers.insert(XAPI_VERSION_HEADER, HeaderValue::from_static(XAPI_VERSION));
        }

        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(upstream_headers)
            .basic_auth(&tenant.lrs_username, Some(&tenant.lrs_password));
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        let upstream = request.send().await.map_err(|e| {
            warn!(tenant_id = %tenant.tenant_id, url = %url, error = %e, "LRS request failed");
            Error::Upstream(e)
        })?;

        let status = upstream.status();
        debug!(
            tenant_id = %tenant.tenant_id,
            method = %method,
            url = %url,
            lrs_status = %status,
            "Request proxied to LRS"
        );

        let response_headers = filter_headers(upstream.headers(), &SKIPPED_RESPONSE_HEADERS);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

/// Upstream URL: tenant endpoint + inbound path tail + verbatim query string.
fn upstream_url(endpoint: &str, path: &str, query: Option<&str>) -> String {
    let tail = path.strip_prefix(XAPI_PREFIX).unwrap_or(path);
    let mut url = format!("{}{}", endpoint.trim_end_matches('/'), tail);
    if let Some(q) = query {
        url.push('?');
        url.push_str(q);
    }
    url
}

/// Copy `headers` minus the given (lowercase) names.
fn filter_headers(headers: &HeaderMap, skipped: &[&str]) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        if skipped.contains(&name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
