use super::common::*;
use crate::workflows::issues::domain::{
    ConfirmationKind, ContractorId, IssueId, IssueStatus, Severity,
};
use crate::workflows::issues::intake::{find_duplicate, resolve_intake, IntakeAction};
use crate::workflows::issues::lifecycle;
use crate::workflows::issues::repository::{IssueRepository, RepositoryError};
use crate::workflows::issues::MemoryIssueRepository;

fn fresh_id() -> IssueId {
    IssueId("issue-new".to_string())
}

#[test]
fn duplicate_report_merges_and_escalates() {
    let mut existing = issue("intake-1", DOWNTOWN, Severity::Medium, IssueStatus::Verified);
    existing.confirmation_count = 7;
    existing.confirm_exists_count = 7;

    let resolution = resolve_intake(
        &report(DOWNTOWN, Severity::Low),
        &user("citizen-9"),
        &[existing],
        now(),
        fresh_id,
    );

    assert_eq!(resolution.action, IntakeAction::Merge);
    assert_eq!(resolution.issue.id.0, "intake-1");
    assert_eq!(resolution.issue.confirmation_count, 8);
    assert_eq!(resolution.issue.confirm_exists_count, 8);
    assert_eq!(resolution.issue.severity, Severity::High);
    assert_eq!(resolution.issue.status, IssueStatus::Verified);

    let outcome = resolution.outcome();
    assert_eq!(outcome.resulting_severity, Severity::High);
    assert_eq!(outcome.confirmation_count, 8);

    let basis = resolution.basis.expect("merge records its basis");
    assert_eq!(basis.issue.confirmation_count, 7);

    assert_eq!(resolution.confirmation.kind, ConfirmationKind::Confirm);
    assert_eq!(resolution.confirmation.user_id, user("citizen-9"));
    assert!(resolution.confirmation.from_report);
    assert!(!resolution.confirmation.is_final_decision());
}

#[test]
fn merge_keeps_the_higher_reported_severity() {
    let existing = issue("intake-2", DOWNTOWN, Severity::Low, IssueStatus::Reported);

    let resolution = resolve_intake(
        &report(DOWNTOWN, Severity::Critical),
        &user("citizen-2"),
        &[existing],
        now(),
        fresh_id,
    );

    assert_eq!(resolution.issue.severity, Severity::Critical);
    assert_eq!(resolution.issue.image_url.as_deref(), Some("https://img.example/light.jpg"));
}

#[test]
fn report_in_empty_zone_creates_issue() {
    let elsewhere = issue("intake-3", RIVERSIDE, Severity::High, IssueStatus::Assigned);

    let resolution = resolve_intake(
        &report(DOWNTOWN, Severity::Medium),
        &user("citizen-3"),
        &[elsewhere],
        now(),
        fresh_id,
    );

    assert_eq!(resolution.action, IntakeAction::Create);
    assert!(resolution.basis.is_none());
    let created = &resolution.issue;
    assert_eq!(created.id, fresh_id());
    assert_eq!(created.status, IssueStatus::Reported);
    assert_eq!(created.severity, Severity::Medium);
    assert_eq!(created.confirmation_count, 1);
    assert_eq!(created.confirm_exists_count, 1);
    assert_eq!(created.confirm_fixed_count, 0);
    assert_eq!(created.reopen_count, 0);
    assert_eq!(created.created_at, now());
    assert!(created.assigned_at.is_none());
    assert!(created.completed_at.is_none());
    assert_eq!(created.reported_by, Some(user("citizen-3")));
    assert_eq!(resolution.confirmation.issue_id, fresh_id());
}

#[test]
fn terminal_issues_do_not_absorb_reports() {
    let done = issue("intake-4", DOWNTOWN, Severity::High, IssueStatus::Completed);
    let verified = issue("intake-5", DOWNTOWN, Severity::High, IssueStatus::CitizenVerified);
    let candidates = vec![done, verified];

    assert!(find_duplicate(DOWNTOWN, &candidates).is_none());

    let resolution = resolve_intake(
        &report(DOWNTOWN, Severity::Low),
        &user("citizen-4"),
        &candidates,
        now(),
        fresh_id,
    );
    assert_eq!(resolution.action, IntakeAction::Create);
}

#[test]
fn first_open_candidate_wins() {
    let oldest = issue("intake-6", DOWNTOWN, Severity::Low, IssueStatus::Reopened);
    let newer = issue("intake-7", DOWNTOWN, Severity::Low, IssueStatus::Reported);
    let candidates = vec![oldest, newer];

    let duplicate = find_duplicate(DOWNTOWN, &candidates).expect("open duplicate");
    assert_eq!(duplicate.id.0, "intake-6");
}

#[test]
fn merge_commit_rejects_an_issue_assigned_after_the_read() {
    let repository = MemoryIssueRepository::default();
    let existing = issue("intake-8", DOWNTOWN, Severity::Medium, IssueStatus::Verified);
    repository.insert(existing.clone()).expect("seed issue");

    let candidates = repository.open_in_zone(DOWNTOWN).expect("candidates");
    let resolution = resolve_intake(
        &report(DOWNTOWN, Severity::Low),
        &user("citizen-8"),
        &candidates,
        now(),
        fresh_id,
    );
    assert_eq!(resolution.action, IntakeAction::Merge);

    let mut assigned = existing.clone();
    lifecycle::assign(&mut assigned, ContractorId("ctr-1".to_string()), now()).expect("assign");
    repository
        .compare_and_swap(&existing, assigned, None)
        .expect("authority write");

    let committed = repository.commit_intake(&resolution);
    assert!(matches!(committed, Err(RepositoryError::Conflict)));

    let stored = repository
        .fetch(&existing.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, IssueStatus::Assigned);
    assert_eq!(stored.contractor_id, Some(ContractorId("ctr-1".to_string())));
    assert_eq!(stored.assigned_at, Some(now()));
    assert_eq!(stored.confirmation_count, 1);
}
