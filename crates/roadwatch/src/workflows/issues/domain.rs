use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for reported issues.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueId(pub String);

/// Identifier wrapper for repair contractors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractorId(pub String);

/// Opaque user identity handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContractorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse failures for values that drive escalation and SLA logic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("unknown severity '{0}'")]
    UnknownSeverity(String),
    #[error("unknown issue status '{0}'")]
    UnknownStatus(String),
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("unknown confirmation kind '{0}'")]
    UnknownConfirmationKind(String),
}

/// Citizen or triage assigned urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn ordered() -> [Self; 4] {
        [Self::Critical, Self::High, Self::Medium, Self::Low]
    }

    /// Lower rank means more severe.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(DomainError::UnknownSeverity(value.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Reported,
    Verified,
    Assigned,
    InProgress,
    Completed,
    CitizenVerified,
    Reopened,
}

impl IssueStatus {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Reported,
            Self::Verified,
            Self::Assigned,
            Self::InProgress,
            Self::Completed,
            Self::CitizenVerified,
            Self::Reopened,
        ]
    }

    /// Position along the canonical forward order. `Reopened` sits outside it.
    pub const fn progress_rank(self) -> Option<u8> {
        match self {
            Self::Reported => Some(0),
            Self::Verified => Some(1),
            Self::Assigned => Some(2),
            Self::InProgress => Some(3),
            Self::Completed => Some(4),
            Self::CitizenVerified => Some(5),
            Self::Reopened => None,
        }
    }

    /// Completed work stops the SLA clock and counts as resolved.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::CitizenVerified)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reported => "reported",
            Self::Verified => "verified",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::CitizenVerified => "citizen_verified",
            Self::Reopened => "reopened",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Reported => "Reported",
            Self::Verified => "Verified",
            Self::Assigned => "Assigned",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::CitizenVerified => "Citizen Verified",
            Self::Reopened => "Reopened",
        }
    }
}

impl FromStr for IssueStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownStatus(value.to_string()))
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub zone: String,
}

impl Location {
    /// WGS84 bounds. NaN and infinities fall outside them.
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A reported defect with its full lifecycle history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: IssueStatus,
    pub location: Location,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contractor_id: Option<ContractorId>,
    pub confirmation_count: u32,
    #[serde(default)]
    pub confirm_exists_count: u32,
    #[serde(default)]
    pub confirm_fixed_count: u32,
    #[serde(default)]
    pub reopen_count: u32,
    #[serde(default)]
    pub reported_by: Option<UserId>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Issue {
    pub fn zone(&self) -> &str {
        &self.location.zone
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn is_assigned_to(&self, contractor: &ContractorId) -> bool {
        self.contractor_id.as_ref() == Some(contractor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contractor {
    pub id: ContractorId,
    pub name: String,
    pub zone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationKind {
    /// Citizen confirms the repair holds.
    Confirm,
    /// Citizen reports the repair did not hold.
    Reopen,
    ConfirmExists,
}

impl ConfirmationKind {
    /// `Confirm` and `Reopen` are the one decision a user may cast per issue.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Confirm | Self::Reopen)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Reopen => "reopen",
            Self::ConfirmExists => "confirm_exists",
        }
    }
}

impl FromStr for ConfirmationKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirm" => Ok(Self::Confirm),
            "reopen" => Ok(Self::Reopen),
            "confirm_exists" => Ok(Self::ConfirmExists),
            _ => Err(DomainError::UnknownConfirmationKind(value.to_string())),
        }
    }
}

/// Append-only audit record of one citizen action on one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub issue_id: IssueId,
    pub user_id: UserId,
    pub kind: ConfirmationKind,
    pub timestamp: DateTime<Utc>,
    /// Set on the `confirm` recorded when a report is filed or merged. Those do
    /// not count as the user's verification decision.
    #[serde(default)]
    pub from_report: bool,
}

impl Confirmation {
    pub fn is_final_decision(&self) -> bool {
        self.kind.is_final() && !self.from_report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Authority,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Authority => "authority",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "citizen" => Ok(Self::Citizen),
            "authority" => Ok(Self::Authority),
            _ => Err(DomainError::UnknownRole(value.to_string())),
        }
    }
}

/// Authenticated caller as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn citizen(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role: Role::Citizen,
        }
    }

    pub fn authority(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role: Role::Authority,
        }
    }
}

/// Citizen-submitted report before intake decides whether it merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub location: Location,
    #[serde(default)]
    pub image_url: Option<String>,
}
