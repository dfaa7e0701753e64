// src/proxy.rs

use crate::error::Result;
use crate::retry::call_with_rotation;
use crate::state::AppState;
use crate::upstream::{UpstreamRequest, UpstreamResponse};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Forward a Gemini API call upstream with the pool's current key,
/// rotating keys on rate-limit and overload answers.
#[instrument(name = "proxy_request", skip_all, fields(http.method = %method, url.path = %uri.path()))]
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let request = UpstreamRequest {
        method,
        path_and_query: uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string()),
        headers,
        body,
    };
    debug!(bytes = request.body.len(), "Buffered request body");

    let upstream = &state.upstream;
    let request = &request;
    let response = call_with_rotation(&state.pool, &state.retry_policy, |key| async move {
        upstream.send(&key, request).await
    })
    .await?;

    into_axum_response(response)
}

fn into_axum_response(upstream: UpstreamResponse) -> Result<Response> {
    let mut response = Response::builder()
        .status(upstream.status)
        .body(Body::from(upstream.body))?;
    *response.headers_mut() = upstream.headers;
    Ok(response)
}
