//! `frontgate run` — start the proxy server.
//!
//! Loads and validates the configuration, builds the routing table,
//! installs the metrics recorder, and serves on the configured listen
//! address until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::FileSource;
use crate::error::FrontgateError;
use crate::server::{self, AppState};
use crate::{health, instrumentation, logging};

pub async fn execute(args: RunArgs) -> Result<(), FrontgateError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| crate::sentry_integration::init(dsn, args.sentry_environment.as_deref()));

    let source = FileSource::new(args.config.clone());
    let config = source.load().await?;

    tracing::debug!(config = ?config, "config loaded");

    let listen = config.listen.clone();
    let service_count = config.services.len();
    let host_count = config.total_hosts();

    let mut state = AppState::from_config(config, health::default_checker())?
        .with_backend_timeout(Duration::from_millis(args.timeout));
    if !args.no_metrics {
        state = state.with_metrics(instrumentation::install()?);
    }

    for (domain, backends) in state.table.iter() {
        let hosts: Vec<String> = backends.hosts().iter().map(ToString::to_string).collect();
        tracing::info!(domain, hosts = ?hosts, "route ready");
    }

    let router = server::build_router(Arc::new(state), args.max_body);

    let listener = tokio::net::TcpListener::bind((listen.bind_host(), listen.port)).await?;
    let addr = listener.local_addr()?;

    tracing::info!(
        addr = %addr,
        config = %source.path().display(),
        services = service_count,
        hosts = host_count,
        "frontgate started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    tracing::info!("frontgate stopped");
    Ok(())
}
