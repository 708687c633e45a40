//! Per-request latency tracing of one backend round trip.
//!
//! The transport fires [`ClientTrace`] hooks at fixed points of the
//! exchange (connection acquired, request written, first response byte)
//! on a [`Tracer`] owned by the request task. [`Tracer::finish`] marks
//! completion once the full response has been read and yields the
//! [`TraceStats`] breakdown:
//!
//! ```text
//! got_conn ── wrote_request ── got_first_response_byte ── done
//!    │  latency_request │    latency_backend     │ latency_response │
//!    └──────────────────────── latency_total ────────────────────────┘
//! ```

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Lifecycle hooks invoked synchronously by the outbound transport.
pub trait ClientTrace: Send + Sync {
    /// A connection to the backend is ready to carry the request.
    fn got_conn(&self);
    /// The request has been fully written to the wire.
    fn wrote_request(&self);
    /// The first byte of the response has arrived.
    fn got_first_response_byte(&self);
}

#[derive(Debug, Clone, Default)]
pub struct TraceStats {
    got_conn: Option<Instant>,
    wrote_request: Option<Instant>,
    got_first_response_byte: Option<Instant>,
    done: Option<Instant>,

    /// Time to send the request once the connection was acquired.
    pub latency_request: Duration,
    /// Time the backend spent before its first response byte.
    pub latency_backend: Duration,
    /// Time to receive the rest of the response.
    pub latency_response: Duration,
    pub latency_total: Duration,
}

/// `later - earlier` when both were recorded, zero otherwise.
fn span(earlier: Option<Instant>, later: Option<Instant>) -> Duration {
    match (earlier, later) {
        (Some(a), Some(b)) => b.saturating_duration_since(a),
        _ => Duration::ZERO,
    }
}

impl TraceStats {
    pub fn got_conn_at(&mut self, at: Instant) {
        self.got_conn = Some(at);
    }

    pub fn wrote_request_at(&mut self, at: Instant) {
        self.wrote_request = Some(at);
    }

    /// Only the first byte counts; later calls are ignored.
    pub fn got_first_response_byte_at(&mut self, at: Instant) {
        self.got_first_response_byte.get_or_insert(at);
    }

    /// Record completion and derive every duration.
    pub fn done_at(&mut self, at: Instant) {
        self.done = Some(at);
        self.latency_request = span(self.got_conn, self.wrote_request);
        self.latency_backend = span(self.wrote_request, self.got_first_response_byte);
        self.latency_response = span(self.got_first_response_byte, self.done);
        self.latency_total = span(self.got_conn, self.done);
    }

    pub fn done(&mut self) {
        self.done_at(Instant::now());
    }

    /// False when no connection was ever acquired, in which case the
    /// durations are zero and carry no meaning.
    #[must_use]
    pub const fn has_timing(&self) -> bool {
        self.got_conn.is_some()
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.latency_total.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for TraceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request({:?}) Backend({:?}) Response({:?}) Total({:?})",
            self.latency_request, self.latency_backend, self.latency_response, self.latency_total
        )
    }
}

/// Shared handle the transport writes timestamps into.
#[derive(Debug, Default)]
pub struct Tracer {
    stats: Mutex<TraceStats>,
}

impl Tracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_stats(&self, f: impl FnOnce(&mut TraceStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    /// Mark the exchange complete and return the breakdown.
    #[must_use]
    pub fn finish(&self) -> TraceStats {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.done();
        stats.clone()
    }
}

impl ClientTrace for Tracer {
    fn got_conn(&self) {
        self.with_stats(|s| s.got_conn_at(Instant::now()));
    }

    fn wrote_request(&self) {
        self.with_stats(|s| s.wrote_request_at(Instant::now()));
    }

    fn got_first_response_byte(&self) {
        self.with_stats(|s| s.got_first_response_byte_at(Instant::now()));
    }
}
