use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::domain::{
    Actor, ConfirmationKind, ContractorId, Issue, IssueId, IssueStatus, NewReport, Role, UserId,
};
use super::intake::{find_duplicate, resolve_intake, IntakeAction, IntakeOutcome};
use super::lifecycle::{self, ConfirmationEffect, ConfirmationError, TransitionError};
use super::report::{
    self, dashboard_stats, issue_view, reporter_summary, DashboardStats, IssueView,
    ReporterSummary, SlaQueue,
};
use super::repository::{IssueRepository, RepositoryError};
use super::scoring::{score_contractors, ContractorPerformance};

/// Attempts made for a single write before giving up under contention.
pub const INTAKE_RETRY_LIMIT: usize = 3;

/// Service composing the store adapter, clock, and role gating around the pure core.
pub struct IssueService<R, C> {
    repository: Arc<R>,
    clock: Arc<C>,
}

static ISSUE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_issue_id() -> IssueId {
    let id = ISSUE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    IssueId(format!("issue-{id:06}"))
}

impl<R, C> IssueService<R, C>
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    pub fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// File a citizen report, merging it into the zone's oldest open issue if there is one.
    pub fn submit_report(
        &self,
        actor: &Actor,
        report: NewReport,
    ) -> Result<IntakeOutcome, IssueServiceError> {
        validate_report(&report)?;

        for attempt in 1..=INTAKE_RETRY_LIMIT {
            let candidates = self.repository.open_in_zone(&report.location.zone)?;
            let fresh_id = match find_duplicate(&report.location.zone, &candidates) {
                Some(_) => None,
                None => Some(self.unused_issue_id()?),
            };
            let resolution = resolve_intake(
                &report,
                &actor.user_id,
                &candidates,
                self.clock.now(),
                || fresh_id.unwrap_or_else(next_issue_id),
            );

            match self.repository.commit_intake(&resolution) {
                Ok(()) => {
                    let outcome = resolution.outcome();
                    match outcome.action {
                        IntakeAction::Create => info!(
                            issue_id = %outcome.issue_id,
                            zone = %report.location.zone,
                            severity = %outcome.resulting_severity,
                            "issue reported"
                        ),
                        IntakeAction::Merge => info!(
                            issue_id = %outcome.issue_id,
                            zone = %report.location.zone,
                            severity = %outcome.resulting_severity,
                            confirmations = outcome.confirmation_count,
                            "report merged into open issue"
                        ),
                    }
                    return Ok(outcome);
                }
                Err(RepositoryError::Conflict | RepositoryError::Duplicate) => {
                    warn!(
                        attempt,
                        zone = %report.location.zone,
                        "intake raced a concurrent write, retrying"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(IssueServiceError::Contention)
    }

    pub fn verify(&self, actor: &Actor, id: &IssueId) -> Result<Issue, IssueServiceError> {
        self.transition(actor, id, lifecycle::verify)
    }

    pub fn assign(
        &self,
        actor: &Actor,
        id: &IssueId,
        contractor: ContractorId,
    ) -> Result<Issue, IssueServiceError> {
        require_role(actor, Role::Authority)?;
        let known = self
            .repository
            .contractors()?
            .iter()
            .any(|existing| existing.id == contractor);
        if !known {
            return Err(IssueServiceError::Validation(format!(
                "unknown contractor '{contractor}'"
            )));
        }
        self.transition(actor, id, |issue, now| {
            lifecycle::assign(issue, contractor.clone(), now)
        })
    }

    pub fn start_work(&self, actor: &Actor, id: &IssueId) -> Result<Issue, IssueServiceError> {
        self.transition(actor, id, |issue, _| lifecycle::start_work(issue))
    }

    pub fn complete(&self, actor: &Actor, id: &IssueId) -> Result<Issue, IssueServiceError> {
        self.transition(actor, id, lifecycle::complete)
    }

    pub fn set_status(
        &self,
        actor: &Actor,
        id: &IssueId,
        target: IssueStatus,
    ) -> Result<Issue, IssueServiceError> {
        self.transition(actor, id, |issue, now| {
            lifecycle::set_status(issue, target, now)
        })
    }

    /// Record a citizen confirmation: "still there", "fixed", or "not fixed".
    pub fn confirm(
        &self,
        actor: &Actor,
        id: &IssueId,
        kind: ConfirmationKind,
    ) -> Result<ConfirmationEffect, IssueServiceError> {
        require_role(actor, Role::Citizen)?;

        for attempt in 1..=INTAKE_RETRY_LIMIT {
            let current = self.fetch(id)?;
            let history = self.repository.confirmations_for(id)?;
            let now = self.clock.now();

            let mut next = current.clone();
            let effect = lifecycle::apply_confirmation(&mut next, &history, &actor.user_id, kind, now)?;

            match self.repository.compare_and_swap(
                &current,
                next,
                Some(effect.confirmation.clone()),
            ) {
                Ok(()) => {
                    log_confirmation(id, &effect);
                    return Ok(effect);
                }
                Err(RepositoryError::Conflict) => {
                    warn!(attempt, issue_id = %id, "confirmation raced a concurrent write, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(IssueServiceError::Contention)
    }

    /// Next sequence id not already held by the store, e.g. by imported seed data.
    fn unused_issue_id(&self) -> Result<IssueId, IssueServiceError> {
        loop {
            let id = next_issue_id();
            if self.repository.fetch(&id)?.is_none() {
                return Ok(id);
            }
            debug!(issue_id = %id, "issue id already taken, drawing the next one");
        }
    }

    pub fn get(&self, id: &IssueId) -> Result<IssueView, IssueServiceError> {
        let issue = self.fetch(id)?;
        Ok(issue_view(issue, self.clock.now()))
    }

    pub fn contractor_rankings(&self) -> Result<Vec<ContractorPerformance>, IssueServiceError> {
        let snapshot = self.repository.snapshot()?;
        Ok(score_contractors(
            &snapshot.issues,
            &snapshot.contractors,
            self.clock.now(),
        ))
    }

    pub fn sla_queue(&self) -> Result<SlaQueue, IssueServiceError> {
        let issues = self.repository.issues()?;
        Ok(report::sla_queue(&issues, self.clock.now()))
    }

    pub fn dashboard(&self) -> Result<DashboardStats, IssueServiceError> {
        let issues = self.repository.issues()?;
        Ok(dashboard_stats(&issues, self.clock.now()))
    }

    pub fn reporter_summary(&self, user: &UserId) -> Result<ReporterSummary, IssueServiceError> {
        let issues = self.repository.issues()?;
        let confirmations = self.repository.confirmations_by(user)?;
        Ok(reporter_summary(
            &issues,
            &confirmations,
            user,
            self.clock.now(),
        ))
    }

    fn fetch(&self, id: &IssueId) -> Result<Issue, IssueServiceError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| IssueServiceError::NotFound(id.clone()))
    }

    fn transition<F>(&self, actor: &Actor, id: &IssueId, apply: F) -> Result<Issue, IssueServiceError>
    where
        F: Fn(&mut Issue, DateTime<Utc>) -> Result<(), TransitionError>,
    {
        require_role(actor, Role::Authority)?;

        for attempt in 1..=INTAKE_RETRY_LIMIT {
            let current = self.fetch(id)?;
            let mut next = current.clone();
            apply(&mut next, self.clock.now())?;

            match self
                .repository
                .compare_and_swap(&current, next.clone(), None)
            {
                Ok(()) => {
                    info!(
                        issue_id = %id,
                        from = %current.status,
                        to = %next.status,
                        actor = %actor.user_id,
                        "issue status changed"
                    );
                    return Ok(next);
                }
                Err(RepositoryError::Conflict) => {
                    warn!(attempt, issue_id = %id, "status change raced a concurrent write, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(IssueServiceError::Contention)
    }
}

fn require_role(actor: &Actor, role: Role) -> Result<(), IssueServiceError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(IssueServiceError::Forbidden {
            required: role,
            actual: actor.role,
        })
    }
}

fn validate_report(report: &NewReport) -> Result<(), IssueServiceError> {
    if report.title.trim().is_empty() {
        return Err(IssueServiceError::Validation("title must not be empty".to_string()));
    }
    if report.location.zone.trim().is_empty() {
        return Err(IssueServiceError::Validation("zone must not be empty".to_string()));
    }
    if !report.location.has_valid_coordinates() {
        return Err(IssueServiceError::Validation(format!(
            "coordinates ({}, {}) are out of range",
            report.location.latitude, report.location.longitude
        )));
    }
    Ok(())
}

fn log_confirmation(id: &IssueId, effect: &ConfirmationEffect) {
    if let Some(severity) = effect.escalated_to {
        info!(issue_id = %id, %severity, "issue escalated by citizen confirmations");
    }
    if effect.status_changed() {
        match effect.status {
            IssueStatus::Reopened => warn!(
                issue_id = %id,
                "reopen quorum reached, SLA clock restarted"
            ),
            status => info!(issue_id = %id, %status, "citizen quorum reached"),
        }
    } else {
        debug!(
            issue_id = %id,
            kind = effect.confirmation.kind.as_str(),
            user = %effect.confirmation.user_id,
            "confirmation recorded"
        );
    }
}

/// Error raised by the issue service.
#[derive(Debug, thiserror::Error)]
pub enum IssueServiceError {
    #[error("{actual:?} role cannot perform an action reserved for {required:?}")]
    Forbidden { required: Role, actual: Role },
    #[error("issue {0} not found")]
    NotFound(IssueId),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("issue kept changing underneath the request; retry later")]
    Contention,
}
