use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use std::io::Read;

use crate::workflows::issues::domain::{
    Contractor, ContractorId, Issue, IssueId, IssueStatus, Location, Severity, UserId,
};

use super::RejectedRow;

/// Rows that parsed, plus the ones that did not and why.
#[derive(Debug)]
pub(crate) struct ParsedRows<T> {
    pub(crate) records: Vec<T>,
    pub(crate) rejected: Vec<RejectedRow>,
}

pub(crate) fn parse_issues<R: Read>(reader: R) -> Result<ParsedRows<Issue>, csv::Error> {
    parse_rows(reader, IssueRow::into_issue)
}

pub(crate) fn parse_contractors<R: Read>(reader: R) -> Result<ParsedRows<Contractor>, csv::Error> {
    parse_rows(reader, |row: ContractorRow| {
        if row.id.is_empty() {
            return Err("contractor id is empty".to_string());
        }
        Ok(Contractor {
            id: ContractorId(row.id),
            name: row.name,
            zone: row.zone,
        })
    })
}

fn parse_rows<R, Row, T, F>(reader: R, convert: F) -> Result<ParsedRows<T>, csv::Error>
where
    R: Read,
    Row: for<'de> Deserialize<'de>,
    F: Fn(Row) -> Result<T, String>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut parsed = ParsedRows {
        records: Vec::new(),
        rejected: Vec::new(),
    };

    for result in csv_reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err),
            Err(err) => {
                parsed.rejected.push(RejectedRow {
                    line: err.position().map_or(0, |position| position.line()),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map_or(0, |position| position.line());

        let converted = record
            .deserialize::<Row>(Some(&headers))
            .map_err(|err| err.to_string())
            .and_then(&convert);

        match converted {
            Ok(value) => parsed.records.push(value),
            Err(reason) => parsed.rejected.push(RejectedRow { line, reason }),
        }
    }

    Ok(parsed)
}

#[derive(Debug, Deserialize)]
struct IssueRow {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    severity: String,
    status: String,
    latitude: f64,
    longitude: f64,
    zone: String,
    created_at: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    verified_at: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    assigned_at: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    completed_at: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    contractor_id: Option<String>,
    #[serde(default)]
    confirmation_count: Option<u32>,
    #[serde(default)]
    confirm_exists_count: Option<u32>,
    #[serde(default)]
    confirm_fixed_count: Option<u32>,
    #[serde(default)]
    reopen_count: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    reported_by: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    image_url: Option<String>,
}

impl IssueRow {
    fn into_issue(self) -> Result<Issue, String> {
        if self.id.is_empty() {
            return Err("issue id is empty".to_string());
        }
        let severity: Severity = self.severity.parse().map_err(|err| format!("{err}"))?;
        let status: IssueStatus = self.status.parse().map_err(|err| format!("{err}"))?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| format!("invalid created_at '{}'", self.created_at))?;
        let location = Location {
            latitude: self.latitude,
            longitude: self.longitude,
            zone: self.zone,
        };
        if !location.has_valid_coordinates() {
            return Err(format!(
                "coordinates ({}, {}) are out of range",
                location.latitude, location.longitude
            ));
        }

        Ok(Issue {
            id: IssueId(self.id),
            title: self.title,
            description: self.description,
            severity,
            status,
            location,
            created_at,
            verified_at: optional_timestamp("verified_at", self.verified_at)?,
            assigned_at: optional_timestamp("assigned_at", self.assigned_at)?,
            completed_at: optional_timestamp("completed_at", self.completed_at)?,
            contractor_id: self.contractor_id.map(ContractorId),
            confirmation_count: self.confirmation_count.unwrap_or(1),
            confirm_exists_count: self.confirm_exists_count.unwrap_or(0),
            confirm_fixed_count: self.confirm_fixed_count.unwrap_or(0),
            reopen_count: self.reopen_count.unwrap_or(0),
            reported_by: self.reported_by.map(UserId),
            image_url: self.image_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ContractorRow {
    id: String,
    name: String,
    #[serde(default)]
    zone: String,
}

fn optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, String> {
    match value {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| format!("invalid {column} '{raw}'")),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// RFC 3339 timestamps or bare `YYYY-MM-DD` dates (taken as midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_timestamp_supports_rfc3339_and_date_strings() {
        let rfc = parse_timestamp("2025-09-24T10:00:00+02:00").expect("parse rfc");
        assert_eq!(rfc, Utc.with_ymd_and_hms(2025, 9, 24, 8, 0, 0).unwrap());

        let date = parse_timestamp("2025-09-30").expect("parse date");
        assert_eq!(date, Utc.with_ymd_and_hms(2025, 9, 30, 0, 0, 0).unwrap());

        assert!(parse_timestamp("  ").is_none());
        assert!(parse_timestamp("not-a-date").is_none());
    }

    #[test]
    fn empty_cells_become_nulls_and_default_counts() {
        let csv = "id,title,description,severity,status,latitude,longitude,zone,created_at,verified_at,assigned_at,completed_at,contractor_id,confirmation_count,confirm_exists_count,confirm_fixed_count,reopen_count,reported_by,image_url\n\
iss-1,Pothole,,high,reported,12.9,77.5,Downtown Core,2025-03-01,,,,,,,,,,\n";

        let parsed = parse_issues(csv.as_bytes()).expect("parse");

        assert!(parsed.rejected.is_empty());
        let issue = &parsed.records[0];
        assert_eq!(issue.severity, Severity::High);
        assert!(issue.assigned_at.is_none());
        assert!(issue.contractor_id.is_none());
        assert!(issue.reported_by.is_none());
        assert_eq!(issue.confirmation_count, 1);
        assert_eq!(issue.reopen_count, 0);
    }

    #[test]
    fn malformed_timestamp_rejects_only_that_row() {
        let csv = "id,title,severity,status,latitude,longitude,zone,created_at,assigned_at\n\
iss-1,Pothole,low,assigned,1.0,2.0,North,2025-03-01,yesterday\n\
iss-2,Sinkhole,critical,assigned,1.0,2.0,North,2025-03-01,2025-03-02T08:00:00Z\n";

        let parsed = parse_issues(csv.as_bytes()).expect("parse");

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].id.0, "iss-2");
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].line, 2);
        assert!(parsed.rejected[0].reason.contains("assigned_at"));
    }

    #[test]
    fn non_finite_or_out_of_range_coordinates_reject_the_row() {
        let csv = "id,title,severity,status,latitude,longitude,zone,created_at\n\
iss-1,Pothole,low,reported,NaN,77.5,North,2025-03-01\n\
iss-2,Sinkhole,high,reported,12.9,181.0,North,2025-03-01\n\
iss-3,Crack,medium,reported,12.9,77.5,North,2025-03-01\n";

        let parsed = parse_issues(csv.as_bytes()).expect("parse");

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].id.0, "iss-3");
        let lines: Vec<u64> = parsed.rejected.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert!(parsed.rejected[0].reason.contains("out of range"));
    }

    #[test]
    fn contractor_rows_require_an_id() {
        let csv = "id,name,zone\nctr-1,Asphalt Partners,Downtown Core\n,Nameless,North\n";

        let parsed = parse_contractors(csv.as_bytes()).expect("parse");

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].line, 3);
    }
}
