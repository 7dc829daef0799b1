use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::domain::{Contractor, Issue};
use super::sla::{completed_within_sla, resolution_days};

const ON_TIME_WEIGHT: f64 = 0.5;
const SPEED_WEIGHT: f64 = 0.3;
const QUALITY_WEIGHT: f64 = 0.2;
/// Each day of average resolution costs this many speed points.
const SPEED_PENALTY_PER_DAY: f64 = 5.0;
/// Each reopen percentage point costs this many quality points.
const QUALITY_PENALTY_PER_REOPEN_POINT: f64 = 2.0;

/// Derived, never-stored performance view of a contractor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractorPerformance {
    pub contractor: Contractor,
    /// Percentage of completed work delivered within the SLA period.
    pub on_time_rate: f64,
    pub avg_resolution_days: f64,
    /// Percentage of all assigned work citizens reopened at least once.
    pub reopen_rate: f64,
    pub total_assigned: usize,
    pub total_completed: usize,
    pub performance_score: f64,
}

/// Scores every contractor and ranks them by performance, best first.
///
/// Ties keep the order in which contractors were supplied.
pub fn score_contractors(
    issues: &[Issue],
    contractors: &[Contractor],
    now: DateTime<Utc>,
) -> Vec<ContractorPerformance> {
    let mut ranked: Vec<ContractorPerformance> = contractors
        .iter()
        .map(|contractor| score_contractor(issues, contractor))
        .collect();

    ranked.sort_by(|a, b| b.performance_score.total_cmp(&a.performance_score));

    debug!(
        contractors = ranked.len(),
        issues = issues.len(),
        %now,
        "contractor rankings recomputed"
    );

    ranked
}

pub fn score_contractor(issues: &[Issue], contractor: &Contractor) -> ContractorPerformance {
    let assigned: Vec<&Issue> = issues
        .iter()
        .filter(|issue| issue.is_assigned_to(&contractor.id))
        .collect();
    let completed: Vec<&Issue> = assigned
        .iter()
        .copied()
        .filter(|issue| issue.status.is_terminal())
        .collect();

    let reopen_rate = percentage(
        assigned.iter().filter(|issue| issue.reopen_count > 0).count(),
        assigned.len(),
    );

    if completed.is_empty() {
        return ContractorPerformance {
            contractor: contractor.clone(),
            on_time_rate: 100.0,
            avg_resolution_days: 0.0,
            reopen_rate,
            total_assigned: assigned.len(),
            total_completed: 0,
            performance_score: 0.0,
        };
    }

    let on_time_rate = percentage(
        completed
            .iter()
            .filter(|issue| completed_within_sla(issue))
            .count(),
        completed.len(),
    );

    let avg_resolution_days = completed
        .iter()
        .map(|issue| resolution_days(issue))
        .sum::<f64>()
        / completed.len() as f64;

    ContractorPerformance {
        contractor: contractor.clone(),
        on_time_rate,
        avg_resolution_days,
        reopen_rate,
        total_assigned: assigned.len(),
        total_completed: completed.len(),
        performance_score: performance_score(on_time_rate, avg_resolution_days, reopen_rate),
    }
}

/// Weighted blend of punctuality, speed, and quality, clamped to 0..=100.
pub fn performance_score(on_time_rate: f64, avg_resolution_days: f64, reopen_rate: f64) -> f64 {
    let speed_score = (100.0 - avg_resolution_days * SPEED_PENALTY_PER_DAY).max(0.0);
    let quality_score = (100.0 - reopen_rate * QUALITY_PENALTY_PER_REOPEN_POINT).max(0.0);

    let score = ON_TIME_WEIGHT * on_time_rate
        + SPEED_WEIGHT * speed_score
        + QUALITY_WEIGHT * quality_score;

    score.clamp(0.0, 100.0)
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
