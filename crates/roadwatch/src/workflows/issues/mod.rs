//! Citizen-reported infrastructure issues: intake, lifecycle, SLA tracking, and
//! contractor performance.
//!
//! The derivation functions (`sla`, `scoring`, `intake`, `report`) are pure and
//! take `now` explicitly. `service` wires them to a store adapter and a clock,
//! and `router` exposes the service over HTTP.

pub mod clock;
pub mod domain;
pub mod feed;
pub mod intake;
pub mod lifecycle;
pub mod memory;
pub mod report;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod severity;
pub mod sla;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    Actor, Confirmation, ConfirmationKind, Contractor, ContractorId, DomainError, Issue, IssueId,
    IssueStatus, Location, NewReport, Role, Severity, UserId,
};
pub use feed::{BoardView, LiveBoard, SnapshotFeed};
pub use intake::{resolve_intake, IntakeAction, IntakeOutcome, IntakeResolution};
pub use lifecycle::{ConfirmationEffect, ConfirmationError, TransitionError, CITIZEN_QUORUM};
pub use memory::MemoryIssueRepository;
pub use report::{
    dashboard_stats, reporter_summary, sla_queue, DashboardStats, IssueView, ReporterSummary,
    SlaQueue, SlaQueueEntry,
};
pub use repository::{IssueRepository, RepositoryError, StoreSnapshot};
pub use router::issue_router;
pub use scoring::{score_contractors, ContractorPerformance};
pub use service::{IssueService, IssueServiceError, INTAKE_RETRY_LIMIT};
pub use severity::{escalated_severity, higher_severity};
pub use sla::{calculate_open_days, evaluate_sla, is_overdue, SlaStatus, SLA_PERIOD_DAYS};
