//! `frontgate backends` — stand-in backends for every configured host.
//!
//! Binds one listener per host of every service and answers any request
//! with `service: <name>, addr: <host:port>`, so a config can be
//! exercised end to end on one machine.

use std::future::Future;
use std::io;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use crate::cli::BackendsArgs;
use crate::config::model::{HostPort, ProxyConfig};
use crate::config::FileSource;
use crate::error::FrontgateError;
use crate::{logging, server};

pub async fn execute(args: BackendsArgs) -> Result<(), FrontgateError> {
    logging::init(&args.log_level, logging::resolve_format(args.pretty, false));

    let config = FileSource::new(args.config).load().await?;
    serve(&config, server::shutdown_signal()).await
}

/// Router that identifies the service and host it stands in for.
pub fn app(service: &str, host: &HostPort) -> Router {
    let reply = format!("service: {service}, addr: {host}");
    Router::new().fallback(move || {
        let reply = reply.clone();
        async move { reply }
    })
}

/// Serve every host in `config` until `shutdown` resolves. Fails as soon
/// as any host cannot be bound or its server stops with an error.
pub async fn serve<F>(config: &ProxyConfig, shutdown: F) -> Result<(), FrontgateError>
where
    F: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = watch::channel(());
    let mut servers = JoinSet::new();

    for service in &config.services {
        for host in &service.hosts {
            let listener = TcpListener::bind((host.bind_host(), host.port)).await?;
            tracing::info!(service = %service.name, addr = %host, "backend listening");

            let app = app(&service.name, host);
            let mut stop = stop_rx.clone();
            servers.spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = stop.changed().await;
                    })
                    .await
            });
        }
    }

    tokio::select! {
        () = shutdown => {}
        Some(result) = servers.join_next() => {
            let _ = stop_tx.send(());
            return flatten(result);
        }
    }

    let _ = stop_tx.send(());
    while let Some(result) = servers.join_next().await {
        flatten(result)?;
    }
    tracing::info!("backends stopped");
    Ok(())
}

fn flatten(result: Result<io::Result<()>, JoinError>) -> Result<(), FrontgateError> {
    result.map_err(io::Error::other)?.map_err(FrontgateError::Io)
}
