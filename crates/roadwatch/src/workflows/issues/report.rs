use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Confirmation, ContractorId, Issue, IssueId, IssueStatus, Severity, UserId};
use super::sla::{calculate_open_days, evaluate_sla, is_due_soon, is_overdue, resolution_days, SlaStatus};

/// Headline numbers for the authority dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_issues: usize,
    pub open_percentage: f64,
    pub overdue_percentage: f64,
    pub avg_resolution_days: f64,
}

pub fn dashboard_stats(issues: &[Issue], now: DateTime<Utc>) -> DashboardStats {
    let total = issues.len();
    if total == 0 {
        return DashboardStats::default();
    }

    let open = issues.iter().filter(|issue| issue.is_open()).count();
    let overdue = issues.iter().filter(|issue| is_overdue(issue, now)).count();

    let completed: Vec<&Issue> = issues.iter().filter(|issue| issue.status.is_terminal()).collect();
    let avg_resolution_days = if completed.is_empty() {
        0.0
    } else {
        completed.iter().map(|issue| resolution_days(issue)).sum::<f64>() / completed.len() as f64
    };

    DashboardStats {
        total_issues: total,
        open_percentage: open as f64 / total as f64 * 100.0,
        overdue_percentage: overdue as f64 / total as f64 * 100.0,
        avg_resolution_days,
    }
}

/// One row of the SLA aging table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaQueueEntry {
    pub issue_id: IssueId,
    pub title: String,
    pub zone: String,
    pub severity: Severity,
    pub status: IssueStatus,
    pub status_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor_id: Option<ContractorId>,
    pub open_days: i64,
    pub sla: SlaStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlaQueue {
    pub entries: Vec<SlaQueueEntry>,
    pub overdue: usize,
    pub due_soon: usize,
    pub unassigned: usize,
}

/// Open issues, overdue first, then newest report first.
pub fn sla_queue(issues: &[Issue], now: DateTime<Utc>) -> SlaQueue {
    let mut queue = SlaQueue::default();

    for issue in issues.iter().filter(|issue| issue.is_open()) {
        let sla = evaluate_sla(issue, now);
        if sla.is_overdue {
            queue.overdue += 1;
        } else if is_due_soon(issue, now) {
            queue.due_soon += 1;
        }
        if issue.assigned_at.is_none() {
            queue.unassigned += 1;
        }

        queue.entries.push(SlaQueueEntry {
            issue_id: issue.id.clone(),
            title: issue.title.clone(),
            zone: issue.location.zone.clone(),
            severity: issue.severity,
            status: issue.status,
            status_label: issue.status.label(),
            contractor_id: issue.contractor_id.clone(),
            open_days: calculate_open_days(issue.created_at, now),
            sla,
            created_at: issue.created_at,
        });
    }

    queue.entries.sort_by(|a, b| {
        b.sla
            .is_overdue
            .cmp(&a.sla.is_overdue)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    queue
}

/// Activity rollup for a single citizen's "my reports" page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReporterSummary {
    pub user_id: Option<UserId>,
    pub total_reported: usize,
    pub resolved: usize,
    pub in_progress: usize,
    pub overdue: usize,
    /// Distinct issues the user confirmed without having reported them.
    pub confirmed: usize,
}

pub fn reporter_summary(
    issues: &[Issue],
    confirmations: &[Confirmation],
    user: &UserId,
    now: DateTime<Utc>,
) -> ReporterSummary {
    let reported: Vec<&Issue> = issues
        .iter()
        .filter(|issue| issue.reported_by.as_ref() == Some(user))
        .collect();
    let reported_ids: HashSet<&IssueId> = reported.iter().map(|issue| &issue.id).collect();

    let confirmed: HashSet<&IssueId> = confirmations
        .iter()
        .filter(|record| &record.user_id == user && !reported_ids.contains(&record.issue_id))
        .map(|record| &record.issue_id)
        .filter(|id| issues.iter().any(|issue| &issue.id == *id))
        .collect();

    ReporterSummary {
        user_id: Some(user.clone()),
        total_reported: reported.len(),
        resolved: reported.iter().filter(|issue| issue.status.is_terminal()).count(),
        in_progress: reported
            .iter()
            .filter(|issue| matches!(issue.status, IssueStatus::Assigned | IssueStatus::InProgress))
            .count(),
        overdue: reported.iter().filter(|issue| is_overdue(issue, now)).count(),
        confirmed: confirmed.len(),
    }
}

/// Single issue as shown on its detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,
    pub status_label: &'static str,
    pub severity_label: &'static str,
    pub open_days: i64,
    pub sla: SlaStatus,
}

pub fn issue_view(issue: Issue, now: DateTime<Utc>) -> IssueView {
    IssueView {
        status_label: issue.status.label(),
        severity_label: issue.severity.label(),
        open_days: calculate_open_days(issue.created_at, now),
        sla: evaluate_sla(&issue, now),
        issue,
    }
}
