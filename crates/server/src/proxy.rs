//! The proxy handler: every request the admin routes don't claim.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri, header};
use axum::response::Response;
use waybackproxy_core::ArchivedRecord;

use crate::error::ProxyError;
use crate::state::AppState;

/// Serve the archived copy of the requested URL at the active timestamp.
pub async fn handle(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Result<Response, ProxyError> {
    let url = target_url(&uri, &headers)?;

    state.history.push(url.as_str()).await;
    let record = state.coordinator.submit(&url).await?;

    Ok(record_response(record))
}

/// URL the client asked for.
///
/// Forward-proxy requests carry it in absolute form. Otherwise it is rebuilt
/// from the Host header, always as `http`.
pub fn target_url(uri: &Uri, headers: &HeaderMap) -> Result<String, ProxyError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(uri.to_string());
    }

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ProxyError::InvalidRequest(format!("no host for {uri}")))?;

    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Ok(format!("http://{host}{path}"))
}

/// Replay a record as an HTTP response.
fn record_response(record: ArchivedRecord) -> Response {
    let status = StatusCode::from_u16(record.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::with_capacity(record.headers.len());
    for (name, value) in &record.headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_bytes(value.as_bytes())) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(url = %record.url, header = %name, "skipping header that cannot be replayed"),
        }
    }

    let mut response = Response::new(Body::from(record.body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
