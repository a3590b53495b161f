use crate::cli::ServeArgs;
use crate::infra::{build_engine, AppState};
use crate::routes::with_reconciliation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use voter_vetting::config::AppConfig;
use voter_vetting::error::AppError;
use voter_vetting::telemetry::{self, LogSink};
use voter_vetting::workflows::StopSignal;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, LogSink::Stdout)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let engine = build_engine(&config.reconciliation);
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        review: engine.review.clone(),
    };

    let app = with_reconciliation_routes(&engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "voter roll reconciliation service ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(engine.stop.clone(), readiness_flag))
        .await?;
    Ok(())
}

/// Resolves on ctrl-c; bulk passes still running see the stop flag at their next chunk.
async fn shutdown_signal(stop: StopSignal, readiness: Arc<std::sync::atomic::AtomicBool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    readiness.store(false, Ordering::Release);
    stop.stop();
    info!("shutdown requested; stopping bulk operations");
}
