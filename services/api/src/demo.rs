use chrono::{DateTime, Duration, Utc};
use clap::Args;
use roadwatch::error::AppError;
use roadwatch::workflows::issues::{
    score_contractors, sla_queue, Actor, Clock, ConfirmationKind, Contractor, ContractorId,
    ContractorPerformance, FixedClock, IntakeAction, IssueId, IssueRepository, IssueService,
    IssueServiceError, IssueStatus, Location, MemoryIssueRepository, NewReport, Severity, SlaQueue,
};
use roadwatch::workflows::seed::{RejectedRow, SeedImporter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct RankingsArgs {
    /// Issue export (CSV) to score against.
    #[arg(long)]
    pub(crate) issues: PathBuf,
    /// Contractor roster (CSV: id,name,zone).
    #[arg(long)]
    pub(crate) contractors: PathBuf,
    /// Evaluation instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub(crate) struct SlaArgs {
    /// Issue export (CSV).
    #[arg(long)]
    pub(crate) issues: PathBuf,
    /// Evaluation instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Pin the demo clock (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
}

pub(crate) fn run_rankings(args: RankingsArgs) -> Result<(), AppError> {
    let issues = SeedImporter::issues_from_path(&args.issues)?;
    let contractors = SeedImporter::contractors_from_path(&args.contractors)?;
    let now = args.now.unwrap_or_else(Utc::now);

    let rankings = score_contractors(&issues.records, &contractors.records, now);

    println!("Contractor rankings as of {}", now.to_rfc3339());
    println!(
        "Issues loaded: {} | Contractors loaded: {}",
        issues.records.len(),
        contractors.records.len()
    );
    render_rankings(&rankings);
    render_rejections(&args.issues, &issues.rejected);
    render_rejections(&args.contractors, &contractors.rejected);
    Ok(())
}

pub(crate) fn run_sla(args: SlaArgs) -> Result<(), AppError> {
    let issues = SeedImporter::issues_from_path(&args.issues)?;
    let now = args.now.unwrap_or_else(Utc::now);

    let queue = sla_queue(&issues.records, now);

    println!("SLA aging queue as of {}", now.to_rfc3339());
    render_sla_queue(&queue);
    render_rejections(&args.issues, &issues.rejected);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let clock = Arc::new(FixedClock::new(args.now.unwrap_or_else(Utc::now)));
    let repository = Arc::new(MemoryIssueRepository::default());
    let service = IssueService::new(repository.clone(), clock.clone());

    for (id, name, zone) in [
        ("ctr-asphalt", "Asphalt Partners", "Downtown Core"),
        ("ctr-bridge", "Bridgeworks Co", "Riverside"),
    ] {
        repository
            .upsert_contractor(Contractor {
                id: ContractorId(id.to_string()),
                name: name.to_string(),
                zone: zone.to_string(),
            })
            .map_err(IssueServiceError::from)?;
    }

    println!("Roadwatch demo");
    println!("Clock pinned at {}", clock.now().to_rfc3339());

    println!("\nCitizen intake");
    let pothole = demo_report(
        &service,
        "citizen-ana",
        "Pothole on Main St",
        Severity::Medium,
        "Downtown Core",
    )?;
    for citizen in ["citizen-ben", "citizen-cho", "citizen-dev"] {
        demo_report(
            &service,
            citizen,
            "Same pothole, getting worse",
            Severity::Low,
            "Downtown Core",
        )?;
    }
    let railing = demo_report(
        &service,
        "citizen-eli",
        "Broken railing on footbridge",
        Severity::High,
        "Riverside",
    )?;

    let authority = Actor::authority("authority-ops");
    println!("\nAuthority actions");
    for (issue_id, contractor) in [(&pothole, "ctr-asphalt"), (&railing, "ctr-bridge")] {
        service.verify(&authority, issue_id)?;
        let issue = service.assign(&authority, issue_id, ContractorId(contractor.to_string()))?;
        println!("  {} assigned to {}", issue.id, contractor);
    }
    service.start_work(&authority, &pothole)?;

    clock.advance(Duration::days(3));
    let completed = service.complete(&authority, &pothole)?;
    println!("  {} completed after 3 days", completed.id);

    clock.advance(Duration::days(6));
    println!("\nCitizen verification on {}", pothole);
    for citizen in ["citizen-ben", "citizen-cho", "citizen-dev"] {
        let effect =
            service.confirm(&Actor::citizen(citizen), &pothole, ConfirmationKind::Reopen)?;
        println!(
            "  {} says not fixed -> status {}",
            citizen,
            effect.status.label()
        );
    }
    let reopened = service.get(&pothole)?;
    if reopened.issue.status == IssueStatus::Reopened {
        println!("  Quorum reached; SLA restarted: {}", reopened.sla.label);
    }

    println!("\nContractor rankings");
    render_rankings(&service.contractor_rankings()?);

    println!("\nSLA aging queue");
    render_sla_queue(&service.sla_queue()?);

    let stats = service.dashboard()?;
    println!(
        "\nDashboard: {} issues | {:.1}% open | {:.1}% overdue | {:.1} avg days to resolve",
        stats.total_issues,
        stats.open_percentage,
        stats.overdue_percentage,
        stats.avg_resolution_days
    );

    Ok(())
}

fn demo_report<R, C>(
    service: &IssueService<R, C>,
    citizen: &str,
    title: &str,
    severity: Severity,
    zone: &str,
) -> Result<IssueId, AppError>
where
    R: IssueRepository + 'static,
    C: Clock + 'static,
{
    let outcome = service.submit_report(
        &Actor::citizen(citizen),
        NewReport {
            title: title.to_string(),
            description: String::new(),
            severity,
            location: Location {
                latitude: 12.9716,
                longitude: 77.5946,
                zone: zone.to_string(),
            },
            image_url: None,
        },
    )?;

    let verb = match outcome.action {
        IntakeAction::Create => "created",
        IntakeAction::Merge => "merged into",
    };
    println!(
        "  {} {} {} (severity {}, {} confirmations)",
        citizen,
        verb,
        outcome.issue_id,
        outcome.resulting_severity.label(),
        outcome.confirmation_count
    );
    Ok(outcome.issue_id)
}

fn render_rankings(rankings: &[ContractorPerformance]) {
    if rankings.is_empty() {
        println!("  No contractors on file");
        return;
    }
    for (position, entry) in rankings.iter().enumerate() {
        println!(
            "  {}. {:<24} score {:>6.2} | on time {:>5.1}% | avg {:>4.1}d | reopened {:>5.1}% | {}/{} completed",
            position + 1,
            entry.contractor.name,
            entry.performance_score,
            entry.on_time_rate,
            entry.avg_resolution_days,
            entry.reopen_rate,
            entry.total_completed,
            entry.total_assigned
        );
    }
}

fn render_sla_queue(queue: &SlaQueue) {
    println!(
        "  Overdue: {} | Due within 24h: {} | Unassigned: {}",
        queue.overdue, queue.due_soon, queue.unassigned
    );
    if queue.entries.is_empty() {
        println!("  No open issues");
        return;
    }
    for entry in &queue.entries {
        let sla = if entry.sla.is_tracked() {
            entry.sla.label.as_str()
        } else {
            "not assigned"
        };
        println!(
            "  {:<12} {:<16} {:<8} {:<12} open {:>3}d | {}",
            entry.issue_id.0,
            entry.zone,
            entry.severity.label(),
            entry.status_label,
            entry.open_days,
            sla
        );
    }
}

fn render_rejections(path: &Path, rejected: &[RejectedRow]) {
    if rejected.is_empty() {
        return;
    }
    eprintln!("Skipped {} row(s) in {}:", rejected.len(), path.display());
    for row in rejected {
        eprintln!("  line {}: {}", row.line, row.reason);
    }
}
