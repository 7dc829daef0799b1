use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::Issue;

/// Repairs are expected to complete within this many days of assignment.
pub const SLA_PERIOD_DAYS: i64 = 7;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Breach state of a single issue at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlaStatus {
    pub is_overdue: bool,
    /// Countdown or overdue text; empty when the issue is outside SLA tracking.
    pub label: String,
}

impl SlaStatus {
    fn untracked() -> Self {
        Self {
            is_overdue: false,
            label: String::new(),
        }
    }

    pub fn is_tracked(&self) -> bool {
        !self.label.is_empty()
    }
}

pub fn sla_period() -> Duration {
    Duration::days(SLA_PERIOD_DAYS)
}

/// Deadline for an issue that is still on the clock.
pub fn sla_deadline(issue: &Issue) -> Option<DateTime<Utc>> {
    if issue.status.is_terminal() {
        return None;
    }
    issue.assigned_at.map(|assigned_at| assigned_at + sla_period())
}

/// Strictly past the deadline. Equality is not overdue.
pub fn is_overdue(issue: &Issue, now: DateTime<Utc>) -> bool {
    sla_deadline(issue).is_some_and(|deadline| now > deadline)
}

pub fn evaluate_sla(issue: &Issue, now: DateTime<Utc>) -> SlaStatus {
    let Some(deadline) = sla_deadline(issue) else {
        return SlaStatus::untracked();
    };

    if now > deadline {
        SlaStatus {
            is_overdue: true,
            label: format!("-{} overdue", countdown(now - deadline)),
        }
    } else {
        SlaStatus {
            is_overdue: false,
            label: format!("{} remaining", countdown(deadline - now)),
        }
    }
}

fn countdown(span: Duration) -> String {
    let hours = span.num_hours().max(0);
    if hours < 24 {
        format!("{hours}h")
    } else {
        format!("{}d", hours / 24)
    }
}

/// Under a day left on the clock and not yet overdue.
pub fn is_due_soon(issue: &Issue, now: DateTime<Utc>) -> bool {
    sla_deadline(issue).is_some_and(|deadline| now <= deadline && deadline - now < Duration::hours(24))
}

/// Whole days since the report, never negative.
pub fn calculate_open_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_days().max(0)
}

/// Time from assignment to completion. Missing timestamps or clock skew read as zero.
pub fn resolution_duration(issue: &Issue) -> Duration {
    match (issue.assigned_at, issue.completed_at) {
        (Some(assigned_at), Some(completed_at)) if completed_at > assigned_at => {
            completed_at - assigned_at
        }
        _ => Duration::zero(),
    }
}

pub fn resolution_days(issue: &Issue) -> f64 {
    resolution_duration(issue).num_seconds() as f64 / SECONDS_PER_DAY
}

pub fn completed_within_sla(issue: &Issue) -> bool {
    resolution_duration(issue) <= sla_period()
}
