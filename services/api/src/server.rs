use crate::cli::ServeArgs;
use crate::infra::{build_engine, AppState};
use crate::routes::with_admission_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use join_github::config::AppConfig;
use join_github::error::AppError;
use join_github::telemetry;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let addr = config.server.socket_addr()?;
    let engine = build_engine(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    // The engine handle outlives the runtime so the blocking clients are
    // dropped on this thread.
    let result = runtime.block_on(serve(addr, &config, engine.clone()));
    drop(runtime);
    result
}

async fn serve(
    addr: SocketAddr,
    config: &AppConfig,
    engine: Arc<crate::infra::ApiEngine>,
) -> Result<(), AppError> {
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_admission_routes(engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        organisations = config.policy.managed_ids().count(),
        send_email_invites = config.admission.send_email_invites,
        "join github service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
