use crate::cli::ServeArgs;
use crate::infra::{sample_directory, AppState};
use crate::routes::with_placement_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use placement_drive::config::AppConfig;
use placement_drive::drives::{
    InMemoryCampusDirectory, InMemoryPlacementRepository, LogDispatcher, PlacementService,
};
use placement_drive::error::AppError;
use placement_drive::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = if args.sample_data {
        sample_directory()
    } else {
        InMemoryCampusDirectory::default()
    };
    let placement_service = Arc::new(PlacementService::new(
        Arc::new(InMemoryPlacementRepository::default()),
        Arc::new(directory),
        Arc::new(LogDispatcher),
        config.placement.clone(),
    ));

    let app = with_placement_routes(placement_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_total_rounds = config.placement.max_total_rounds,
        sample_data = args.sample_data,
        "placement drive service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
