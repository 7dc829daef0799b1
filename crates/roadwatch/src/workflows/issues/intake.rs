use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Confirmation, ConfirmationKind, Issue, IssueId, IssueStatus, NewReport, Severity, UserId,
};
use super::severity::{escalated_severity, higher_severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeAction {
    Merge,
    Create,
}

/// The open issue, exactly as read, that an intake decision was computed against.
///
/// The store re-checks the whole document before committing, so neither a
/// concurrent report nor an authority update in between can be overwritten.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntakeBasis {
    pub issue: Issue,
}

/// Full write set for one citizen report.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeResolution {
    pub action: IntakeAction,
    /// `None` means the zone had no open issue when the decision was made.
    pub basis: Option<IntakeBasis>,
    pub issue: Issue,
    pub confirmation: Confirmation,
}

impl IntakeResolution {
    pub fn outcome(&self) -> IntakeOutcome {
        IntakeOutcome {
            action: self.action,
            issue_id: self.issue.id.clone(),
            resulting_severity: self.issue.severity,
            confirmation_count: self.issue.confirmation_count,
        }
    }
}

/// Caller-facing summary of what intake did with a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeOutcome {
    pub action: IntakeAction,
    pub issue_id: IssueId,
    pub resulting_severity: Severity,
    pub confirmation_count: u32,
}

/// First open issue in the report's zone. Candidate order is decided by the store.
pub fn find_duplicate<'a>(zone: &str, candidates: &'a [Issue]) -> Option<&'a Issue> {
    candidates
        .iter()
        .find(|issue| issue.zone() == zone && issue.is_open())
}

/// Decide whether a report merges into an open issue or opens a new one.
pub fn resolve_intake(
    report: &NewReport,
    reporter: &UserId,
    candidates: &[Issue],
    now: DateTime<Utc>,
    next_id: impl FnOnce() -> IssueId,
) -> IntakeResolution {
    match find_duplicate(&report.location.zone, candidates) {
        Some(existing) => merge_into(existing, report, reporter, now),
        None => create_from(report, reporter, now, next_id()),
    }
}

fn merge_into(
    existing: &Issue,
    report: &NewReport,
    reporter: &UserId,
    now: DateTime<Utc>,
) -> IntakeResolution {
    let confirmation_count = existing.confirmation_count + 1;
    let merged = higher_severity(existing.severity, report.severity);

    let mut issue = existing.clone();
    issue.severity = escalated_severity(merged, confirmation_count);
    issue.confirmation_count = confirmation_count;
    issue.confirm_exists_count += 1;
    if issue.image_url.is_none() {
        issue.image_url = report.image_url.clone();
    }

    IntakeResolution {
        action: IntakeAction::Merge,
        basis: Some(IntakeBasis {
            issue: existing.clone(),
        }),
        confirmation: confirmation(&issue.id, reporter, now),
        issue,
    }
}

fn create_from(
    report: &NewReport,
    reporter: &UserId,
    now: DateTime<Utc>,
    id: IssueId,
) -> IntakeResolution {
    let issue = Issue {
        id,
        title: report.title.clone(),
        description: report.description.clone(),
        severity: report.severity,
        status: IssueStatus::Reported,
        location: report.location.clone(),
        created_at: now,
        verified_at: None,
        assigned_at: None,
        completed_at: None,
        contractor_id: None,
        confirmation_count: 1,
        confirm_exists_count: 1,
        confirm_fixed_count: 0,
        reopen_count: 0,
        reported_by: Some(reporter.clone()),
        image_url: report.image_url.clone(),
    };

    IntakeResolution {
        action: IntakeAction::Create,
        basis: None,
        confirmation: confirmation(&issue.id, reporter, now),
        issue,
    }
}

fn confirmation(issue_id: &IssueId, reporter: &UserId, now: DateTime<Utc>) -> Confirmation {
    Confirmation {
        issue_id: issue_id.clone(),
        user_id: reporter.clone(),
        kind: ConfirmationKind::Confirm,
        timestamp: now,
        from_report: true,
    }
}
