use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use roadwatch::workflows::issues::{issue_router, Clock, IssueRepository, IssueService};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_issue_routes<R, C>(service: Arc<IssueService<R, C>>) -> axum::Router
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    issue_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/board", axum::routing::get(board_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Latest rankings, dashboard, and SLA queue as maintained by the live board.
pub(crate) async fn board_endpoint(Extension(state): Extension<AppState>) -> Response {
    match state.board.current() {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use roadwatch::workflows::issues::{
        Contractor, ContractorId, FixedClock, IssueRepository, LiveBoard, MemoryIssueRepository,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn app_state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
            board: LiveBoard::new(),
        }
    }

    fn test_app(state: AppState) -> (axum::Router, Arc<MemoryIssueRepository>) {
        let repository = Arc::new(MemoryIssueRepository::default());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap(),
        ));
        let service = Arc::new(IssueService::new(repository.clone(), clock));
        (with_issue_routes(service).layer(Extension(state)), repository)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_tracks_the_startup_flag() {
        let state = app_state(false);
        let response = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.store(true, Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn metrics_endpoint_uses_prometheus_text_format() {
        let response = metrics_endpoint(Extension(app_state(true)))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn board_is_unavailable_until_first_snapshot() {
        let state = app_state(true);
        let (app, repository) = test_app(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/board")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        repository
            .upsert_contractor(Contractor {
                id: ContractorId("ctr-1".to_string()),
                name: "Asphalt Partners".to_string(),
                zone: "Downtown Core".to_string(),
            })
            .unwrap();
        state.board.apply(
            &repository.snapshot().unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap(),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/board")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["rankings"][0]["contractor"]["name"], "Asphalt Partners");
        assert_eq!(body["dashboard"]["total_issues"], 0);
    }

    #[tokio::test]
    async fn issue_routes_are_mounted_next_to_probes() {
        let (app, _) = test_app(app_state(true));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
