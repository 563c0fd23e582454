use std::sync::Arc;

use anyhow::Context;
use pinqueue_api::app::{ApiAuth, build_app};
use pinqueue_infra::{Config, DispatchRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pinqueue_observability::init();

    let config = Config::from_env().context("invalid configuration")?;
    let services = Arc::new(
        pinqueue_api::app::services::build_services(&config)
            .await
            .context("failed to initialise services")?,
    );

    let runner = config.dispatch_interval.map(|interval| {
        tracing::info!(interval_secs = interval.as_secs(), "in-process dispatch enabled");
        DispatchRunner::spawn(services.job.clone(), interval)
    });

    let auth = ApiAuth::from_config(&config).context("invalid extension secret")?;
    let app = build_app(services, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(runner) = runner {
        runner.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
