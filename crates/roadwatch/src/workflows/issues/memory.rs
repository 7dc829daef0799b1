use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::{Confirmation, Contractor, Issue, IssueId, UserId};
use super::feed::SnapshotFeed;
use super::intake::{IntakeAction, IntakeResolution};
use super::repository::{IssueRepository, RepositoryError, StoreSnapshot};

#[derive(Debug, Default)]
struct StoreState {
    issues: HashMap<IssueId, Issue>,
    confirmations: Vec<Confirmation>,
    contractors: Vec<Contractor>,
}

impl StoreState {
    fn snapshot(&self) -> StoreSnapshot {
        let mut issues: Vec<Issue> = self.issues.values().cloned().collect();
        sort_oldest_first(&mut issues);
        StoreSnapshot {
            issues,
            contractors: self.contractors.clone(),
        }
    }

    fn open_in_zone(&self, zone: &str) -> Vec<Issue> {
        let mut open: Vec<Issue> = self
            .issues
            .values()
            .filter(|issue| issue.zone() == zone && issue.is_open())
            .cloned()
            .collect();
        sort_oldest_first(&mut open);
        open
    }
}

fn sort_oldest_first(issues: &mut [Issue]) {
    issues.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Mutex-guarded store standing in for the hosted document database.
///
/// Every write publishes the full snapshot to the attached feed, if any.
#[derive(Default, Clone)]
pub struct MemoryIssueRepository {
    state: Arc<Mutex<StoreState>>,
    feed: Option<SnapshotFeed>,
}

impl MemoryIssueRepository {
    pub fn with_feed(feed: SnapshotFeed) -> Self {
        Self {
            state: Arc::default(),
            feed: Some(feed),
        }
    }

    fn write<T>(
        &self,
        apply: impl FnOnce(&mut StoreState) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.state.lock().expect("repository mutex poisoned");
        let value = apply(&mut guard)?;
        if let Some(feed) = &self.feed {
            feed.publish(guard.snapshot());
        }
        Ok(value)
    }

    fn read<T>(&self, view: impl FnOnce(&StoreState) -> T) -> T {
        let guard = self.state.lock().expect("repository mutex poisoned");
        view(&guard)
    }
}

impl IssueRepository for MemoryIssueRepository {
    fn insert(&self, issue: Issue) -> Result<Issue, RepositoryError> {
        self.write(|state| {
            if state.issues.contains_key(&issue.id) {
                return Err(RepositoryError::Duplicate);
            }
            state.issues.insert(issue.id.clone(), issue.clone());
            Ok(issue)
        })
    }

    fn fetch(&self, id: &IssueId) -> Result<Option<Issue>, RepositoryError> {
        Ok(self.read(|state| state.issues.get(id).cloned()))
    }

    fn issues(&self) -> Result<Vec<Issue>, RepositoryError> {
        Ok(self.read(|state| state.snapshot().issues))
    }

    fn open_in_zone(&self, zone: &str) -> Result<Vec<Issue>, RepositoryError> {
        Ok(self.read(|state| state.open_in_zone(zone)))
    }

    fn commit_intake(&self, resolution: &IntakeResolution) -> Result<(), RepositoryError> {
        self.write(|state| {
            let current = state
                .open_in_zone(resolution.issue.zone())
                .into_iter()
                .next();

            let unchanged = match (&resolution.basis, &current) {
                (None, None) => true,
                (Some(basis), Some(issue)) => basis.issue == *issue,
                _ => false,
            };
            if !unchanged {
                return Err(RepositoryError::Conflict);
            }
            if resolution.action == IntakeAction::Create
                && state.issues.contains_key(&resolution.issue.id)
            {
                return Err(RepositoryError::Duplicate);
            }

            state
                .issues
                .insert(resolution.issue.id.clone(), resolution.issue.clone());
            state.confirmations.push(resolution.confirmation.clone());
            Ok(())
        })
    }

    fn compare_and_swap(
        &self,
        current: &Issue,
        next: Issue,
        confirmation: Option<Confirmation>,
    ) -> Result<(), RepositoryError> {
        self.write(|state| {
            match state.issues.get(&current.id) {
                None => return Err(RepositoryError::NotFound),
                Some(stored) if stored != current => return Err(RepositoryError::Conflict),
                Some(_) => {}
            }
            state.issues.insert(next.id.clone(), next);
            state.confirmations.extend(confirmation);
            Ok(())
        })
    }

    fn confirmations_for(&self, issue: &IssueId) -> Result<Vec<Confirmation>, RepositoryError> {
        Ok(self.read(|state| {
            state
                .confirmations
                .iter()
                .filter(|record| &record.issue_id == issue)
                .cloned()
                .collect()
        }))
    }

    fn confirmations_by(&self, user: &UserId) -> Result<Vec<Confirmation>, RepositoryError> {
        Ok(self.read(|state| {
            state
                .confirmations
                .iter()
                .filter(|record| &record.user_id == user)
                .cloned()
                .collect()
        }))
    }

    fn upsert_contractor(&self, contractor: Contractor) -> Result<(), RepositoryError> {
        self.write(|state| {
            match state
                .contractors
                .iter_mut()
                .find(|existing| existing.id == contractor.id)
            {
                Some(existing) => *existing = contractor,
                None => state.contractors.push(contractor),
            }
            Ok(())
        })
    }

    fn contractors(&self) -> Result<Vec<Contractor>, RepositoryError> {
        Ok(self.read(|state| state.contractors.clone()))
    }

    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        Ok(self.read(StoreState::snapshot))
    }
}
