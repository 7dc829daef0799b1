//! CSV import of issue and contractor snapshots for the in-memory store.

mod parser;

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::workflows::issues::domain::{Contractor, Issue};
use crate::workflows::issues::repository::{IssueRepository, RepositoryError};

pub use parser::parse_timestamp;

#[derive(Debug, thiserror::Error)]
pub enum SeedImportError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not load seed data into the store: {0}")]
    Repository(#[from] RepositoryError),
}

/// A data row that could not be imported. `line` is 1-based and counts the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug)]
pub struct ImportReport<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedRow>,
}

impl<T> ImportReport<T> {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Counts of what a seed load placed in the store.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub issues: usize,
    pub contractors: usize,
    pub rejected: usize,
}

pub struct SeedImporter;

impl SeedImporter {
    pub fn issues_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<ImportReport<Issue>, SeedImportError> {
        let file = std::fs::File::open(path)?;
        Self::issues_from_reader(file)
    }

    pub fn issues_from_reader<R: Read>(reader: R) -> Result<ImportReport<Issue>, SeedImportError> {
        let parsed = parser::parse_issues(reader)?;
        Ok(ImportReport {
            records: parsed.records,
            rejected: parsed.rejected,
        })
    }

    pub fn contractors_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<ImportReport<Contractor>, SeedImportError> {
        let file = std::fs::File::open(path)?;
        Self::contractors_from_reader(file)
    }

    pub fn contractors_from_reader<R: Read>(
        reader: R,
    ) -> Result<ImportReport<Contractor>, SeedImportError> {
        let parsed = parser::parse_contractors(reader)?;
        Ok(ImportReport {
            records: parsed.records,
            rejected: parsed.rejected,
        })
    }

    /// Load whichever seed files are given into `repository`.
    ///
    /// Rejected rows are logged and counted; duplicate issue ids keep the first row.
    pub fn load_into<R: IssueRepository>(
        repository: &R,
        issues: Option<&Path>,
        contractors: Option<&Path>,
    ) -> Result<SeedSummary, SeedImportError> {
        let mut summary = SeedSummary::default();

        if let Some(path) = contractors {
            let report = Self::contractors_from_path(path)?;
            log_rejections(path, &report.rejected);
            summary.rejected += report.rejected.len();
            for contractor in report.records {
                repository.upsert_contractor(contractor)?;
                summary.contractors += 1;
            }
        }

        if let Some(path) = issues {
            let report = Self::issues_from_path(path)?;
            log_rejections(path, &report.rejected);
            summary.rejected += report.rejected.len();
            for issue in report.records {
                let id = issue.id.clone();
                match repository.insert(issue) {
                    Ok(_) => summary.issues += 1,
                    Err(RepositoryError::Duplicate) => {
                        warn!(issue_id = %id, "duplicate issue id in seed file, keeping first row");
                        summary.rejected += 1;
                    }
                    Err(other) => return Err(other.into()),
                }
            }
        }

        info!(
            issues = summary.issues,
            contractors = summary.contractors,
            rejected = summary.rejected,
            "seed data loaded"
        );
        Ok(summary)
    }
}

fn log_rejections(path: &Path, rejected: &[RejectedRow]) {
    for row in rejected {
        warn!(file = %path.display(), line = row.line, reason = %row.reason, "seed row rejected");
    }
}
