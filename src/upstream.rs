// src/upstream.rs

//! Gemini passthrough call.
//!
//! [`UpstreamClient::send`] forwards one buffered request with a given key and
//! maps the answer onto `Result<UpstreamResponse, UpstreamFailure>`, the shape
//! the retry wrapper classifies.

use crate::classify::UpstreamFailure;
use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::{AppError, Result};
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

/// Header carrying the key on every upstream call.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

// Hop-by-hop headers that should not be forwarded
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    // Caller credentials never reach upstream; the pool key replaces them
    "authorization",
    "x-goog-api-key",
    "x-admin-token",
];

/// A buffered inbound request, replayable once per attempt.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A successful (2xx) upstream answer.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    target_url: Url,
}

impl UpstreamClient {
    pub fn new(server: &ServerConfig, upstream: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(server.connect_timeout_secs))
            .timeout(Duration::from_secs(server.request_timeout_secs))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()?;
        let target_url = Url::parse(&upstream.target_url)?;
        Ok(Self { client, target_url })
    }

    pub fn target_url(&self) -> &Url {
        &self.target_url
    }

    /// Forward `request` using `key`.
    ///
    /// Non-2xx answers become an [`UpstreamFailure`] carrying the status and
    /// body text; network errors become a status-less failure.
    pub async fn send(
        &self,
        key: &str,
        request: &UpstreamRequest,
    ) -> std::result::Result<UpstreamResponse, UpstreamFailure> {
        let url = self
            .build_url(&request.path_and_query)
            .map_err(|e| UpstreamFailure::transport(e.to_string()))?;
        let headers = build_forward_headers(&request.headers, key)
            .map_err(|e| UpstreamFailure::transport(e.to_string()))?;

        debug!(method = %request.method, path = %url.path(), "Forwarding request upstream");
        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Upstream request failed");
                UpstreamFailure::transport(e.to_string())
            })?;

        let status = response.status();
        let response_headers = build_response_headers(response.headers());
        let body = response.bytes().await.map_err(|e| {
            warn!(status = %status, error = %e, "Error reading upstream response body");
            UpstreamFailure::new(
                (!status.is_success()).then_some(status.as_u16()),
                format!("Upstream body read error (status {status}): {e}"),
            )
        })?;

        if status.is_success() {
            debug!(status = %status, bytes = body.len(), "Upstream answered");
            Ok(UpstreamResponse {
                status,
                headers: response_headers,
                body,
            })
        } else {
            debug!(status = %status, "Upstream rejected request");
            Err(UpstreamFailure::http(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ))
        }
    }

    /// Target base joined with the inbound path; any `key` query parameter is
    /// dropped so the caller cannot override the pool.
    fn build_url(&self, path_and_query: &str) -> Result<Url> {
        let base = self.target_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{path_and_query}"))?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| name != "key")
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        Ok(url)
    }
}

fn build_forward_headers(original: &HeaderMap, api_key: &str) -> Result<HeaderMap> {
    let mut filtered = HeaderMap::with_capacity(original.len() + 1);
    copy_non_hop_by_hop_headers(original, &mut filtered);
    let value = HeaderValue::from_str(api_key)
        .map_err(|_| AppError::internal("API key contains characters not valid in a header"))?;
    filtered.insert(API_KEY_HEADER, value);
    Ok(filtered)
}

fn build_response_headers(original: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(original.len());
    copy_non_hop_by_hop_headers(original, &mut filtered);
    filtered
}

fn copy_non_hop_by_hop_headers(source: &HeaderMap, dest: &mut HeaderMap) {
    for (name, value) in source {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            trace!(header = %name, "Skipping hop-by-hop or auth header");
        } else {
            dest.append(name.clone(), value.clone());
        }
    }
}
