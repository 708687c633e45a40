//! Header-triggered health probes.
//!
//! A request carrying a non-empty `health-check` header is answered
//! directly instead of being proxied. The injected [`HealthChecker`]
//! inspects the routing table and either passes (`200 ok`) or fails
//! (`503` with the failure message as the body).

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::proxy::table::RoutingTable;

pub const HEALTH_CHECK_HEADER: &str = "health-check";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HealthError(pub String);

impl HealthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Decides whether the proxy is healthy given its current backends.
pub trait HealthChecker: Send + Sync {
    fn check(&self, table: &RoutingTable) -> Result<(), HealthError>;
}

impl<F> HealthChecker for F
where
    F: Fn(&RoutingTable) -> Result<(), HealthError> + Send + Sync,
{
    fn check(&self, table: &RoutingTable) -> Result<(), HealthError> {
        self(table)
    }
}

/// Reports healthy unconditionally.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysHealthy;

impl HealthChecker for AlwaysHealthy {
    fn check(&self, _table: &RoutingTable) -> Result<(), HealthError> {
        Ok(())
    }
}

#[must_use]
pub fn default_checker() -> Arc<dyn HealthChecker> {
    Arc::new(AlwaysHealthy)
}

/// True when the request is a health probe, whatever the header's value.
#[must_use]
pub fn is_health_check(headers: &HeaderMap) -> bool {
    headers
        .get(HEALTH_CHECK_HEADER)
        .is_some_and(|v| !v.as_bytes().is_empty())
}

pub fn respond(checker: &dyn HealthChecker, table: &RoutingTable) -> Response {
    match checker.check(table) {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}
