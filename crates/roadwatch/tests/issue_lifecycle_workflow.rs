use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use roadwatch::workflows::issues::{
    Actor, Clock, ConfirmationKind, Contractor, ContractorId, FixedClock, IntakeAction,
    IssueRepository, IssueService, IssueServiceError, IssueStatus, Location,
    MemoryIssueRepository, NewReport, Severity,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid start timestamp")
}

fn report(title: &str, zone: &str, severity: Severity) -> NewReport {
    NewReport {
        title: title.to_string(),
        description: "Reported from the mobile app".to_string(),
        severity,
        location: Location {
            latitude: 12.9716,
            longitude: 77.5946,
            zone: zone.to_string(),
        },
        image_url: None,
    }
}

fn service_with_contractor() -> (
    IssueService<MemoryIssueRepository, FixedClock>,
    Arc<FixedClock>,
) {
    let repository = Arc::new(MemoryIssueRepository::default());
    repository
        .upsert_contractor(Contractor {
            id: ContractorId("ctr-asphalt".to_string()),
            name: "Asphalt Partners".to_string(),
            zone: "Downtown Core".to_string(),
        })
        .expect("contractor stored");
    let clock = Arc::new(FixedClock::new(start()));
    (IssueService::new(repository, clock.clone()), clock)
}

#[test]
fn reported_issue_runs_through_repair_and_reopen_quorum() {
    let (service, clock) = service_with_contractor();
    let authority = Actor::authority("ops-1");

    let created = service
        .submit_report(
            &Actor::citizen("citizen-a"),
            report("Pothole", "Downtown Core", Severity::Medium),
        )
        .expect("report filed");
    assert_eq!(created.action, IntakeAction::Create);
    let issue_id = created.issue_id;

    let merged = service
        .submit_report(
            &Actor::citizen("citizen-b"),
            report("Same pothole", "Downtown Core", Severity::Low),
        )
        .expect("duplicate filed");
    assert_eq!(merged.action, IntakeAction::Merge);
    assert_eq!(merged.issue_id, issue_id);
    assert_eq!(merged.confirmation_count, 2);

    service.verify(&authority, &issue_id).expect("verified");
    let assigned = service
        .assign(&authority, &issue_id, ContractorId("ctr-asphalt".to_string()))
        .expect("assigned");
    assert_eq!(assigned.assigned_at, Some(start()));

    clock.advance(Duration::days(3));
    let view = service.get(&issue_id).expect("view");
    assert_eq!(view.sla.label, "4d remaining");

    service.start_work(&authority, &issue_id).expect("started");
    let completed = service.complete(&authority, &issue_id).expect("completed");
    assert_eq!(completed.status, IssueStatus::Completed);

    clock.advance(Duration::days(2));
    for citizen in ["citizen-a", "citizen-b", "citizen-c"] {
        service
            .confirm(&Actor::citizen(citizen), &issue_id, ConfirmationKind::Reopen)
            .expect("reopen recorded");
    }

    let reopened = service.get(&issue_id).expect("view");
    assert_eq!(reopened.issue.status, IssueStatus::Reopened);
    assert_eq!(reopened.issue.assigned_at, Some(clock.now()));
    assert!(reopened.issue.completed_at.is_none());
    assert_eq!(reopened.sla.label, "7d remaining");
    assert!(!reopened.sla.is_overdue);

    let second_vote =
        service.confirm(&Actor::citizen("citizen-a"), &issue_id, ConfirmationKind::Confirm);
    assert!(matches!(second_vote, Err(IssueServiceError::Confirmation(_))));
}

#[test]
fn citizen_quorum_verifies_completed_work() {
    let (service, _clock) = service_with_contractor();
    let authority = Actor::authority("ops-1");

    let issue_id = service
        .submit_report(
            &Actor::citizen("citizen-a"),
            report("Broken streetlight", "Riverside", Severity::Low),
        )
        .expect("report filed")
        .issue_id;
    service
        .assign(&authority, &issue_id, ContractorId("ctr-asphalt".to_string()))
        .expect("assigned");
    service.complete(&authority, &issue_id).expect("completed");

    let mut last_status = IssueStatus::Completed;
    for citizen in ["citizen-a", "citizen-b", "citizen-c"] {
        last_status = service
            .confirm(&Actor::citizen(citizen), &issue_id, ConfirmationKind::Confirm)
            .expect("confirmation recorded")
            .status;
    }
    assert_eq!(last_status, IssueStatus::CitizenVerified);

    let dashboard = service.dashboard().expect("dashboard");
    assert_eq!(dashboard.total_issues, 1);
    assert_eq!(dashboard.open_percentage, 0.0);
}

#[test]
fn citizens_cannot_run_authority_actions() {
    let (service, _clock) = service_with_contractor();
    let citizen = Actor::citizen("citizen-a");

    let issue_id = service
        .submit_report(&citizen, report("Flooded underpass", "North", Severity::High))
        .expect("report filed")
        .issue_id;

    let result = service.verify(&citizen, &issue_id);
    assert!(matches!(result, Err(IssueServiceError::Forbidden { .. })));
    assert_eq!(
        service.get(&issue_id).expect("view").issue.status,
        IssueStatus::Reported
    );
}
