use crate::cli::ServeArgs;
use crate::infra::{ApiIssueService, AppState};
use crate::routes::with_issue_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use roadwatch::config::AppConfig;
use roadwatch::error::AppError;
use roadwatch::telemetry;
use roadwatch::workflows::issues::{
    Clock, IssueRepository, IssueServiceError, LiveBoard, MemoryIssueRepository, SnapshotFeed,
    SystemClock,
};
use roadwatch::workflows::seed::SeedImporter;
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

    let clock = Arc::new(SystemClock);
    let feed = SnapshotFeed::new();
    let board = LiveBoard::new();
    board.spawn(&feed, clock.clone());

    let repository = MemoryIssueRepository::with_feed(feed);
    let seeded = SeedImporter::load_into(
        &repository,
        config.seed.issues.as_deref(),
        config.seed.contractors.as_deref(),
    )?;
    let initial = repository.snapshot().map_err(IssueServiceError::from)?;
    board.apply(&initial, clock.now());

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        board,
    };

    let issue_service: Arc<ApiIssueService> =
        Arc::new(ApiIssueService::new(Arc::new(repository), clock));

    let app = with_issue_routes(issue_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        seeded_issues = seeded.issues,
        seeded_contractors = seeded.contractors,
        "roadwatch issue service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
