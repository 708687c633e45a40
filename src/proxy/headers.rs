//! Header forwarding and hop-by-hop stripping.
//!
//! [`build_forwarded_headers`] clones the caller's headers, strips
//! hop-by-hop headers and the health probe marker, makes sure a `Host`
//! is present, appends the caller to `X-Forwarded-For`, and stamps the
//! correlation id.

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::model::HostPort;
use crate::health::HEALTH_CHECK_HEADER;

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-connection",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Strip hop-by-hop headers from a backend response.
///
/// `content-length` is end-to-end and is kept, including on HEAD and 304
/// replies whose body is empty.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: &str,
    backend: &HostPort,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = original.clone();

    // Headers named in Connection are hop-by-hop as well
    let listed: Vec<HeaderName> = headers
        .get_all(hyper::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| name.trim().parse::<HeaderName>().ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }

    // Routing metadata, not for the backend
    headers.remove(HEALTH_CHECK_HEADER);

    // The inbound Host is kept; backends that need one always get one
    if !headers.contains_key(hyper::header::HOST) {
        if let Ok(val) = HeaderValue::from_str(&backend.to_string()) {
            headers.insert(hyper::header::HOST, val);
        }
    }

    // X-Forwarded-For: append to chain
    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.to_string(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    if let Ok(val) = HeaderValue::from_str(correlation_id) {
        headers.insert(CORRELATION_ID_HEADER, val);
    }

    headers
}
