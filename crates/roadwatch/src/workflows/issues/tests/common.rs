use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::issues::domain::{
    Confirmation, Contractor, ContractorId, Issue, IssueId, IssueStatus, Location, NewReport,
    Severity, UserId,
};
use crate::workflows::issues::intake::IntakeResolution;
use crate::workflows::issues::repository::{IssueRepository, RepositoryError};
use crate::workflows::issues::{issue_router, FixedClock, IssueService, MemoryIssueRepository};

pub(super) const DOWNTOWN: &str = "Downtown Core";
pub(super) const RIVERSIDE: &str = "Riverside";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

pub(super) fn issue(id: &str, zone: &str, severity: Severity, status: IssueStatus) -> Issue {
    Issue {
        id: IssueId(id.to_string()),
        title: format!("Pothole {id}"),
        description: "Deep pothole in the left lane".to_string(),
        severity,
        status,
        location: Location {
            latitude: 12.9716,
            longitude: 77.5946,
            zone: zone.to_string(),
        },
        created_at: days_ago(10),
        verified_at: None,
        assigned_at: None,
        completed_at: None,
        contractor_id: None,
        confirmation_count: 1,
        confirm_exists_count: 1,
        confirm_fixed_count: 0,
        reopen_count: 0,
        reported_by: Some(UserId("citizen-origin".to_string())),
        image_url: None,
    }
}

pub(super) fn assigned_issue(id: &str, contractor: &str, assigned_days_ago: i64) -> Issue {
    let mut issue = issue(id, DOWNTOWN, Severity::Medium, IssueStatus::Assigned);
    issue.contractor_id = Some(ContractorId(contractor.to_string()));
    issue.assigned_at = Some(days_ago(assigned_days_ago));
    issue
}

/// Completed work, assigned `assigned_days_ago` and finished `took_days` later.
pub(super) fn completed_issue(
    id: &str,
    contractor: &str,
    assigned_days_ago: i64,
    took_days: i64,
) -> Issue {
    let mut issue = assigned_issue(id, contractor, assigned_days_ago);
    issue.status = IssueStatus::Completed;
    issue.completed_at = Some(days_ago(assigned_days_ago) + Duration::days(took_days));
    issue
}

pub(super) fn contractor(id: &str, name: &str) -> Contractor {
    Contractor {
        id: ContractorId(id.to_string()),
        name: name.to_string(),
        zone: DOWNTOWN.to_string(),
    }
}

pub(super) fn report(zone: &str, severity: Severity) -> NewReport {
    NewReport {
        title: "Broken streetlight".to_string(),
        description: "Light has been out for a week".to_string(),
        severity,
        location: Location {
            latitude: 12.97,
            longitude: 77.59,
            zone: zone.to_string(),
        },
        image_url: Some("https://img.example/light.jpg".to_string()),
    }
}

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(super) type TestService = IssueService<MemoryIssueRepository, FixedClock>;

pub(super) fn build_service() -> (Arc<TestService>, MemoryIssueRepository, Arc<FixedClock>) {
    let repository = MemoryIssueRepository::default();
    let clock = Arc::new(FixedClock::new(now()));
    let service = Arc::new(IssueService::new(
        Arc::new(repository.clone()),
        clock.clone(),
    ));
    (service, repository, clock)
}

pub(super) fn seeded_service(
    issues: Vec<Issue>,
    contractors: Vec<Contractor>,
) -> (Arc<TestService>, MemoryIssueRepository, Arc<FixedClock>) {
    let (service, repository, clock) = build_service();
    for issue in issues {
        repository.insert(issue).expect("seed issue");
    }
    for contractor in contractors {
        repository.upsert_contractor(contractor).expect("seed contractor");
    }
    (service, repository, clock)
}

pub(super) fn router_with_service(service: Arc<TestService>) -> axum::Router {
    issue_router(service)
}

/// Wraps the memory store and slips a competing report into the zone between
/// the first intake read and its commit.
pub(super) struct RacingRepository {
    pub inner: MemoryIssueRepository,
    pub competitor: Issue,
    attempts: AtomicUsize,
}

impl RacingRepository {
    pub(super) fn new(inner: MemoryIssueRepository, competitor: Issue) -> Self {
        Self {
            inner,
            competitor,
            attempts: AtomicUsize::new(0),
        }
    }

    pub(super) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl IssueRepository for RacingRepository {
    fn insert(&self, issue: Issue) -> Result<Issue, RepositoryError> {
        self.inner.insert(issue)
    }

    fn fetch(&self, id: &IssueId) -> Result<Option<Issue>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn issues(&self) -> Result<Vec<Issue>, RepositoryError> {
        self.inner.issues()
    }

    fn open_in_zone(&self, zone: &str) -> Result<Vec<Issue>, RepositoryError> {
        self.inner.open_in_zone(zone)
    }

    fn commit_intake(&self, resolution: &IntakeResolution) -> Result<(), RepositoryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt == 0 {
            self.inner.insert(self.competitor.clone())?;
        }
        self.inner.commit_intake(resolution)
    }

    fn compare_and_swap(
        &self,
        current: &Issue,
        next: Issue,
        confirmation: Option<Confirmation>,
    ) -> Result<(), RepositoryError> {
        self.inner.compare_and_swap(current, next, confirmation)
    }

    fn confirmations_for(&self, issue: &IssueId) -> Result<Vec<Confirmation>, RepositoryError> {
        self.inner.confirmations_for(issue)
    }

    fn confirmations_by(&self, user: &UserId) -> Result<Vec<Confirmation>, RepositoryError> {
        self.inner.confirmations_by(user)
    }

    fn upsert_contractor(&self, contractor: Contractor) -> Result<(), RepositoryError> {
        self.inner.upsert_contractor(contractor)
    }

    fn contractors(&self) -> Result<Vec<Contractor>, RepositoryError> {
        self.inner.contractors()
    }
}

pub(super) struct UnavailableRepository;

impl IssueRepository for UnavailableRepository {
    fn insert(&self, _issue: Issue) -> Result<Issue, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &IssueId) -> Result<Option<Issue>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn issues(&self) -> Result<Vec<Issue>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn open_in_zone(&self, _zone: &str) -> Result<Vec<Issue>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit_intake(&self, _resolution: &IntakeResolution) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap(
        &self,
        _current: &Issue,
        _next: Issue,
        _confirmation: Option<Confirmation>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn confirmations_for(&self, _issue: &IssueId) -> Result<Vec<Confirmation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn confirmations_by(&self, _user: &UserId) -> Result<Vec<Confirmation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn upsert_contractor(&self, _contractor: Contractor) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn contractors(&self) -> Result<Vec<Contractor>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
