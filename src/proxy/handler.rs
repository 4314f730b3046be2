use crate::k8s::types::RouteKey;
use crate::proxy::server::AppState;
use crate::ProxyError;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::debug;

/// Hop-by-hop headers are meaningful for a single connection and must not be
/// forwarded (RFC 7230, section 6.1).
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|h| name.as_str() == *h)
}

/// Headers safe to pass through in either direction. `Host` is rebuilt by the
/// upstream client from the backend address.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if !is_hop_by_hop(name) && *name != header::HOST {
            forwarded.append(name.clone(), value.clone());
        }
    }

    forwarded
}

/// Split a proxy path into the routing key and the path forwarded upstream.
/// Pure function of the request path.
fn parse_route(path: &str) -> Result<(RouteKey, String), ProxyError> {
    let rest = path
        .strip_prefix("/proxy/")
        .ok_or_else(|| ProxyError::InvalidPath(path.to_string()))?;

    let mut parts = rest.splitn(3, '/');
    let namespace = parts.next().unwrap_or_default();
    let pod = parts.next().unwrap_or_default();

    if namespace.is_empty() || pod.is_empty() {
        return Err(ProxyError::InvalidPath(path.to_string()));
    }

    let upstream_path = match parts.next() {
        Some(tail) => format!("/{}", tail),
        None => "/".to_string(),
    };

    Ok((RouteKey::new(namespace, pod), upstream_path))
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::BackendNotFound { .. } | ProxyError::InvalidPath(_) => {
                StatusCode::NOT_FOUND
            }
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Forward one inbound request to the backend resolved from its path.
pub async fn forward(State(state): State<AppState>, req: Request) -> Response {
    let response = match proxy_request(&state, req).await {
        Ok(response) => response,
        Err(err) => {
            let response = err.into_response();
            if response.status().is_server_error() {
                state.metrics.upstream_errors_total.inc();
            }
            response
        }
    };

    state
        .metrics
        .requests_total
        .with_label_values(&[response.status().as_str()])
        .inc();

    response
}

async fn proxy_request(state: &AppState, req: Request) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();

    let (key, upstream_path) = parse_route(parts.uri.path())?;

    // Fresh lookup per request: a backend removed from the registry stops
    // receiving new traffic immediately, whatever the connection pool holds.
    let backend = state
        .registry
        .lookup(&key)
        .ok_or_else(|| ProxyError::BackendNotFound {
            name: key.pod_name.clone(),
            namespace: key.namespace.clone(),
        })?;

    let query = parts
        .uri
        .query()
        .map(|q| format!("?{}", q))
        .unwrap_or_default();
    let url = format!("http://{}{}{}", backend.addr(), upstream_path, query);
    debug!("{} {} -> {}", parts.method, parts.uri.path(), url);

    let headers = forwardable_headers(&parts.headers);
    let upstream = state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send();

    let upstream_response = match tokio::time::timeout(state.response_timeout, upstream).await {
        Err(_) => return Err(ProxyError::UpstreamTimeout(state.response_timeout)),
        Ok(Err(e)) if e.is_timeout() => {
            return Err(ProxyError::UpstreamTimeout(state.response_timeout))
        }
        Ok(Err(e)) => return Err(ProxyError::Upstream(format!("{}: {}", backend.addr(), e))),
        Ok(Ok(response)) => response,
    };

    let status = upstream_response.status();
    let mut headers = HeaderMap::new();
    for (name, value) in upstream_response.headers() {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    Ok(response)
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "backends": state.registry.len(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
