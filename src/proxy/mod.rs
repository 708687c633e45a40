//! Core request routing handler.
//!
//! [`forward_handler`] is the Axum fallback that receives every request.
//! Health probes are answered directly. Everything else must name a
//! service domain in the `s` query parameter; the parameter is removed,
//! a backend is picked from the service's [`BackendSet`](table::BackendSet),
//! and the request is relayed over a traced connection. The backend's
//! body is streamed back, and stats are logged and recorded when it
//! ends. Submodules hold the routing table ([`table`]), selection policy
//! ([`selector`]), latency tracer ([`trace`]), transport ([`transport`]),
//! and header handling ([`headers`]).

pub mod headers;
pub mod selector;
pub mod table;
pub mod trace;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::health;
use crate::instrumentation;
use crate::server::AppState;

use self::trace::{TraceStats, Tracer};
use self::transport::{BackendRequest, TracedBody};

/// Query parameter naming the target service domain.
pub const SERVICE_PARAM: &str = "s";

const SERVICE_NOT_FOUND: &str = "service not found";

/// Value of the first `s` parameter, when present and non-empty.
#[must_use]
pub fn service_param(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == SERVICE_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Drop every `s` pair from the raw query. The remaining segments are
/// kept byte for byte, escapes included. `None` when nothing is left.
#[must_use]
pub fn strip_service_param(query: Option<&str>) -> Option<String> {
    let kept: Vec<&str> = query?
        .split('&')
        .filter(|segment| !segment.is_empty() && !is_service_segment(segment))
        .collect();
    (!kept.is_empty()).then(|| kept.join("&"))
}

fn is_service_segment(segment: &str) -> bool {
    let key = segment.split_once('=').map_or(segment, |(k, _)| k);
    url::form_urlencoded::parse(key.as_bytes())
        .next()
        .is_some_and(|(k, _)| k == SERVICE_PARAM)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, SERVICE_NOT_FOUND).into_response()
}

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    if health::is_health_check(&req_headers) {
        return health::respond(state.health.as_ref(), &state.table);
    }

    let correlation_id = req_headers
        .get(headers::CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let Some(service) = service_param(uri.query()) else {
        tracing::warn!(
            correlation_id = %correlation_id,
            uri = %uri,
            "missing 's' parameter"
        );
        return not_found();
    };

    let Some(backends) = state.table.get(&service) else {
        tracing::warn!(
            correlation_id = %correlation_id,
            service = %service,
            "no backends for service"
        );
        return not_found();
    };

    let Some(backend) = backends.select() else {
        tracing::error!(
            correlation_id = %correlation_id,
            service = %service,
            "service has no hosts"
        );
        return (StatusCode::BAD_GATEWAY, "no backend available").into_response();
    };

    let path_and_query = match strip_service_param(uri.query()) {
        Some(query) => format!("{}?{query}", uri.path()),
        None => uri.path().to_string(),
    };

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        service = %service,
        backend = %backend,
        target = %path_and_query,
        "routing request"
    );

    let forwarded_headers = headers::build_forwarded_headers(
        &req_headers,
        &addr.ip().to_string(),
        backend,
        &correlation_id,
    );

    let tracer = Arc::new(Tracer::new());
    let result = transport::send(
        BackendRequest {
            backend,
            method,
            path_and_query,
            headers: forwarded_headers,
            body,
            timeout: state.backend_timeout,
        },
        tracer.clone(),
    )
    .await;

    match result {
        Ok(backend_response) => {
            let status = backend_response.status;
            let mut resp_headers = backend_response.headers;
            headers::strip_response_hop_by_hop(&mut resp_headers);

            let outcome = Outcome {
                correlation_id,
                service,
                status: status.as_u16(),
            };
            let body = TracedBody::new(backend_response.body, move || {
                outcome.report(&tracer.finish());
            });

            let mut response = Response::new(Body::new(body));
            *response.status_mut() = status;
            *response.headers_mut() = resp_headers;
            response
        }
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                service = %service,
                backend = %backend,
                error = %e,
                "backend request failed"
            );
            let status = e.status();
            Outcome {
                correlation_id,
                service,
                status: status.as_u16(),
            }
            .report(&tracer.finish());
            (status, e.to_string()).into_response()
        }
    }
}

/// What is reported once a proxied exchange is over.
struct Outcome {
    correlation_id: String,
    service: String,
    status: u16,
}

impl Outcome {
    fn report(self, stats: &TraceStats) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            service = %self.service,
            status = self.status,
            request_ms = stats.latency_request.as_secs_f64() * 1000.0,
            backend_ms = stats.latency_backend.as_secs_f64() * 1000.0,
            response_ms = stats.latency_response.as_secs_f64() * 1000.0,
            total_ms = stats.total_ms(),
            "Stats: {stats}"
        );
        instrumentation::record(&self.service, self.status, stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_param_extraction() {
        assert_eq!(service_param(None), None);
        assert_eq!(service_param(Some("")), None);
        assert_eq!(service_param(Some("s=")), None);
        assert_eq!(service_param(Some("a=1")), None);
        assert_eq!(
            service_param(Some("a=1&s=my-service.my-company.com")),
            Some("my-service.my-company.com".into())
        );
        assert_eq!(service_param(Some("s=first&s=second")), Some("first".into()));
    }

    #[test]
    fn service_param_is_percent_decoded() {
        assert_eq!(service_param(Some("s=a%2Eb")), Some("a.b".into()));
    }

    #[test]
    fn strip_removes_every_s() {
        assert_eq!(strip_service_param(None), None);
        assert_eq!(strip_service_param(Some("s=x")), None);
        assert_eq!(
            strip_service_param(Some("s=x&a=1&s=y&b=two")),
            Some("a=1&b=two".into())
        );
    }

    #[test]
    fn strip_keeps_raw_bytes_of_other_params() {
        assert_eq!(strip_service_param(Some("q=%FF&s=x")), Some("q=%FF".into()));
        assert_eq!(
            strip_service_param(Some("q=%FF%FE&s=x&path=a%2Fb")),
            Some("q=%FF%FE&path=a%2Fb".into())
        );
        assert_eq!(strip_service_param(Some("flag&s=x")), Some("flag".into()));
        assert_eq!(strip_service_param(Some("s=x&")), None);
    }

    #[test]
    fn strip_matches_encoded_key() {
        assert_eq!(strip_service_param(Some("%73=x&a=1")), Some("a=1".into()));
    }

    #[test]
    fn strip_keeps_other_params_encoded() {
        assert_eq!(
            strip_service_param(Some("q=hello+world&s=svc")),
            Some("q=hello+world".into())
        );
    }
}
