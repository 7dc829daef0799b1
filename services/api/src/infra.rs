use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use roadwatch::workflows::issues::{IssueService, LiveBoard, MemoryIssueRepository, SystemClock};
use roadwatch::workflows::seed::parse_timestamp;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type ApiIssueService = IssueService<MemoryIssueRepository, SystemClock>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) board: LiveBoard,
}

/// clap value parser for `--now` style flags.
pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw)
        .ok_or_else(|| format!("failed to parse '{raw}' as an RFC 3339 timestamp or YYYY-MM-DD"))
}
