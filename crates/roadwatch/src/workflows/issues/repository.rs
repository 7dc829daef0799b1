use serde::Serialize;

use super::domain::{Confirmation, Contractor, Issue, IssueId, UserId};
use super::intake::IntakeResolution;

/// Full materialised store contents, as delivered by the change feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub issues: Vec<Issue>,
    pub contractors: Vec<Contractor>,
}

/// Document store adapter so the service module can be exercised in isolation.
///
/// Writes are single-document and atomic. `commit_intake` and
/// `compare_and_swap` reject stale writes with [`RepositoryError::Conflict`] so
/// callers can re-read and retry.
pub trait IssueRepository: Send + Sync {
    fn insert(&self, issue: Issue) -> Result<Issue, RepositoryError>;
    fn fetch(&self, id: &IssueId) -> Result<Option<Issue>, RepositoryError>;
    fn issues(&self) -> Result<Vec<Issue>, RepositoryError>;

    /// Non-terminal issues in `zone`, oldest report first.
    fn open_in_zone(&self, zone: &str) -> Result<Vec<Issue>, RepositoryError>;

    /// Persist an intake decision if the zone still looks the way it did when
    /// the decision was made.
    fn commit_intake(&self, resolution: &IntakeResolution) -> Result<(), RepositoryError>;

    /// Replace `current` with `next`, appending `confirmation` in the same write.
    fn compare_and_swap(
        &self,
        current: &Issue,
        next: Issue,
        confirmation: Option<Confirmation>,
    ) -> Result<(), RepositoryError>;

    fn confirmations_for(&self, issue: &IssueId) -> Result<Vec<Confirmation>, RepositoryError>;
    fn confirmations_by(&self, user: &UserId) -> Result<Vec<Confirmation>, RepositoryError>;

    fn upsert_contractor(&self, contractor: Contractor) -> Result<(), RepositoryError>;
    fn contractors(&self) -> Result<Vec<Contractor>, RepositoryError>;

    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        Ok(StoreSnapshot {
            issues: self.issues()?,
            contractors: self.contractors()?,
        })
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently")]
    Conflict,
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
