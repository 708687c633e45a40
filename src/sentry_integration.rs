//! Optional Sentry error tracking.
//!
//! Errors logged through `tracing` (failed backends, failed health
//! probes) are forwarded as Sentry events by the layer installed in
//! [`logging::init`](crate::logging::init). Hold the returned guard for
//! the lifetime of the process so queued events are flushed on exit.

pub fn init(dsn: &str, environment: Option<&str>) -> sentry::ClientInitGuard {
    let dsn = dsn
        .parse::<sentry::types::Dsn>()
        .inspect_err(|e| tracing::warn!(error = %e, "invalid Sentry DSN, error tracking disabled"))
        .ok();

    sentry::init(sentry::ClientOptions {
        dsn,
        environment: environment.map(|e| e.to_owned().into()),
        release: sentry::release_name!(),
        attach_stacktrace: true,
        ..Default::default()
    })
}
