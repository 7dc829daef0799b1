use super::domain::Severity;

/// Confirmation counts at which severity is raised to at least medium, high,
/// and critical respectively.
pub const MEDIUM_ESCALATION_THRESHOLD: u32 = 3;
pub const HIGH_ESCALATION_THRESHOLD: u32 = 8;
pub const CRITICAL_ESCALATION_THRESHOLD: u32 = 15;

/// Returns the more severe of two severities.
pub fn higher_severity(left: Severity, right: Severity) -> Severity {
    if left.rank() <= right.rank() {
        left
    } else {
        right
    }
}

/// Raises severity according to the number of citizen confirmations. Never lowers it.
pub fn escalated_severity(current: Severity, confirmation_count: u32) -> Severity {
    if confirmation_count >= CRITICAL_ESCALATION_THRESHOLD {
        Severity::Critical
    } else if confirmation_count >= HIGH_ESCALATION_THRESHOLD {
        higher_severity(current, Severity::High)
    } else if confirmation_count >= MEDIUM_ESCALATION_THRESHOLD {
        higher_severity(current, Severity::Medium)
    } else {
        current
    }
}
