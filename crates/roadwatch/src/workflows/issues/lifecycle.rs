//! Issue status machine and the citizen confirmation rules layered on top of it.
//!
//! Authorities move issues forward along
//! `reported → verified → assigned → in_progress → completed`. Citizens close the
//! loop: three "fixed" decisions promote a completed issue to `citizen_verified`,
//! three "not fixed" decisions force it back to `reopened` and restart the SLA
//! clock.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Confirmation, ConfirmationKind, ContractorId, Issue, IssueStatus, Severity, UserId,
};
use super::severity::escalated_severity;

/// Matching citizen decisions required to verify or reopen an issue.
pub const CITIZEN_QUORUM: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot move issue from {from} to {to}")]
    InvalidTransition { from: IssueStatus, to: IssueStatus },
    #[error("issue cannot be completed before it is assigned")]
    NotAssigned,
    #[error("{0} is only reachable through citizen quorum")]
    RequiresQuorum(IssueStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmationError {
    #[error("user {0} already recorded a decision on this issue")]
    AlreadyDecided(UserId),
    #[error("user {0} already confirmed this issue exists")]
    AlreadyConfirmedExists(UserId),
    #[error("issue is {0} and is not awaiting citizen verification")]
    NotAwaitingVerification(IssueStatus),
    #[error("issue is {0} and no longer accepts existence confirmations")]
    AlreadyResolved(IssueStatus),
}

/// Whether an authority may move an issue directly between two statuses.
pub fn can_transition(from: IssueStatus, to: IssueStatus) -> bool {
    match (from, to) {
        (IssueStatus::Reopened, target) => matches!(
            target,
            IssueStatus::Assigned | IssueStatus::InProgress | IssueStatus::Completed
        ),
        (_, IssueStatus::Reopened) => false,
        (from, to) => match (from.progress_rank(), to.progress_rank()) {
            (Some(current), Some(target)) => target > current,
            _ => false,
        },
    }
}

pub fn verify(issue: &mut Issue, now: DateTime<Utc>) -> Result<(), TransitionError> {
    ensure(issue, IssueStatus::Verified, |from| {
        from == IssueStatus::Reported
    })?;
    issue.status = IssueStatus::Verified;
    issue.verified_at = Some(now);
    Ok(())
}

/// Assign (or re-assign) a contractor. Starts a fresh SLA window.
pub fn assign(
    issue: &mut Issue,
    contractor: ContractorId,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    ensure(issue, IssueStatus::Assigned, |from| {
        matches!(
            from,
            IssueStatus::Reported
                | IssueStatus::Verified
                | IssueStatus::Assigned
                | IssueStatus::Reopened
        )
    })?;
    issue.status = IssueStatus::Assigned;
    issue.contractor_id = Some(contractor);
    issue.assigned_at = Some(now);
    Ok(())
}

pub fn start_work(issue: &mut Issue) -> Result<(), TransitionError> {
    ensure(issue, IssueStatus::InProgress, |from| {
        matches!(from, IssueStatus::Assigned | IssueStatus::Reopened)
    })?;
    if issue.assigned_at.is_none() {
        return Err(TransitionError::NotAssigned);
    }
    issue.status = IssueStatus::InProgress;
    Ok(())
}

pub fn complete(issue: &mut Issue, now: DateTime<Utc>) -> Result<(), TransitionError> {
    ensure(issue, IssueStatus::Completed, |from| {
        matches!(
            from,
            IssueStatus::Assigned | IssueStatus::InProgress | IssueStatus::Reopened
        )
    })?;
    let assigned_at = issue.assigned_at.ok_or(TransitionError::NotAssigned)?;
    issue.status = IssueStatus::Completed;
    issue.completed_at = Some(now.max(assigned_at));
    Ok(())
}

/// Generic forward move used by the authority status picker.
pub fn set_status(
    issue: &mut Issue,
    target: IssueStatus,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    match target {
        IssueStatus::Reopened | IssueStatus::CitizenVerified => {
            return Err(TransitionError::RequiresQuorum(target));
        }
        _ => {}
    }
    if !can_transition(issue.status, target) {
        return Err(TransitionError::InvalidTransition {
            from: issue.status,
            to: target,
        });
    }

    match target {
        IssueStatus::Verified => {
            issue.verified_at.get_or_insert(now);
        }
        IssueStatus::Assigned | IssueStatus::InProgress => {
            issue.assigned_at.get_or_insert(now);
        }
        IssueStatus::Completed => {
            let assigned_at = issue.assigned_at.ok_or(TransitionError::NotAssigned)?;
            issue.completed_at = Some(now.max(assigned_at));
        }
        _ => {}
    }
    issue.status = target;
    Ok(())
}

fn ensure(
    issue: &Issue,
    target: IssueStatus,
    allowed: impl Fn(IssueStatus) -> bool,
) -> Result<(), TransitionError> {
    if allowed(issue.status) {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            from: issue.status,
            to: target,
        })
    }
}

/// What a citizen action changed, alongside the audit record to append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationEffect {
    pub confirmation: Confirmation,
    pub previous_status: IssueStatus,
    pub status: IssueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_to: Option<Severity>,
}

impl ConfirmationEffect {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.status
    }
}

/// Apply one citizen action to `issue`.
///
/// `history` holds the confirmations already recorded for this issue.
pub fn apply_confirmation(
    issue: &mut Issue,
    history: &[Confirmation],
    user: &UserId,
    kind: ConfirmationKind,
    now: DateTime<Utc>,
) -> Result<ConfirmationEffect, ConfirmationError> {
    let previous_status = issue.status;
    let mut escalated_to = None;
    let issue_id = issue.id.clone();
    let by_user = history
        .iter()
        .filter(|record| record.issue_id == issue_id && &record.user_id == user);

    match kind {
        ConfirmationKind::ConfirmExists => {
            if issue.status.is_terminal() {
                return Err(ConfirmationError::AlreadyResolved(issue.status));
            }
            // Filing or merging a report already counted this user as confirming existence.
            if by_user.clone().any(|record| {
                record.kind == ConfirmationKind::ConfirmExists || record.from_report
            }) {
                return Err(ConfirmationError::AlreadyConfirmedExists(user.clone()));
            }
            issue.confirm_exists_count += 1;
            issue.confirmation_count += 1;
            let escalated = escalated_severity(issue.severity, issue.confirmation_count);
            if escalated != issue.severity {
                issue.severity = escalated;
                escalated_to = Some(escalated);
            }
        }
        ConfirmationKind::Confirm | ConfirmationKind::Reopen => {
            if !issue.status.is_terminal() {
                return Err(ConfirmationError::NotAwaitingVerification(issue.status));
            }
            if by_user.clone().any(Confirmation::is_final_decision) {
                return Err(ConfirmationError::AlreadyDecided(user.clone()));
            }
            if kind == ConfirmationKind::Confirm {
                issue.confirm_fixed_count += 1;
                if issue.status == IssueStatus::Completed
                    && issue.confirm_fixed_count >= CITIZEN_QUORUM
                {
                    issue.status = IssueStatus::CitizenVerified;
                }
            } else {
                issue.reopen_count += 1;
                if issue.reopen_count >= CITIZEN_QUORUM {
                    issue.status = IssueStatus::Reopened;
                    issue.assigned_at = Some(now);
                    issue.completed_at = None;
                }
            }
        }
    }

    Ok(ConfirmationEffect {
        confirmation: Confirmation {
            issue_id,
            user_id: user.clone(),
            kind,
            timestamp: now,
            from_report: false,
        },
        previous_status,
        status: issue.status,
        escalated_to,
    })
}
