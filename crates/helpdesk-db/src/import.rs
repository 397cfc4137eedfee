//! Bulk import of client queries from CSV exports.
//!
//! Column headers are matched against a fixed set of synonyms, rows are
//! normalized (status, timestamps) and written in a single transaction.
//! Rows that collide with an existing (mail_id, heading) pair are skipped.

use std::io;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;
use helpdesk_types::models::QueryStatus;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::is_unique_violation;
use crate::models::{format_timestamp, now};
use crate::{Database, StoreError, begin_write};

/// Accepted header -> target column.
const HEADER_SYNONYMS: &[(&str, Column)] = &[
    ("mail_id", Column::MailId),
    ("client_email", Column::MailId),
    ("mobile_number", Column::MobileNumber),
    ("client_mobile", Column::MobileNumber),
    ("query_heading", Column::Heading),
    ("query_description", Column::Description),
    ("status", Column::Status),
    ("query_created_time", Column::CreatedTime),
    ("date_raised", Column::CreatedTime),
    ("query_closed_time", Column::ClosedTime),
    ("date_closed", Column::ClosedTime),
];

const REQUIRED: &[Column] = &[
    Column::MailId,
    Column::Heading,
    Column::Description,
    Column::Status,
    Column::CreatedTime,
];

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%d-%m-%Y %H:%M:%S"];
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    /// Rows whose (mail_id, heading) pair already existed.
    pub duplicates: usize,
    /// Rows without a mail_id.
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    MailId,
    MobileNumber,
    Heading,
    Description,
    Status,
    CreatedTime,
    ClosedTime,
}

impl Column {
    fn name(self) -> &'static str {
        match self {
            Column::MailId => "mail_id",
            Column::MobileNumber => "mobile_number",
            Column::Heading => "query_heading",
            Column::Description => "query_description",
            Column::Status => "status",
            Column::CreatedTime => "query_created_time",
            Column::ClosedTime => "query_closed_time",
        }
    }
}

/// Header positions of each recognized column.
#[derive(Debug, Default)]
struct ColumnMap {
    positions: Vec<(Column, usize)>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, ImportError> {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let header = header.trim().to_ascii_lowercase();
            let found = HEADER_SYNONYMS
                .iter()
                .find(|(name, _)| *name == header)
                .map(|(_, column)| *column);
            match found {
                // First matching header wins when synonyms appear together
                Some(column) if map.position(column).is_none() => {
                    map.positions.push((column, idx))
                }
                Some(_) => debug!("Ignoring repeated column '{}'", header),
                None => debug!("Ignoring unknown column '{}'", header),
            }
        }

        let missing: Vec<&'static str> = REQUIRED
            .iter()
            .filter(|column| map.position(**column).is_none())
            .map(|column| column.name())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        Ok(map)
    }

    fn position(&self, column: Column) -> Option<usize> {
        self.positions
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, idx)| *idx)
    }

    /// Trimmed cell value; blank cells read as `None`.
    fn get<'r>(&self, record: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.position(column)
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// A CSV row normalized for insertion.
#[derive(Debug, Clone, PartialEq)]
struct ImportRow {
    mail_id: Option<String>,
    mobile_number: Option<String>,
    heading: Option<String>,
    description: Option<String>,
    status: QueryStatus,
    created: DateTime<Utc>,
    closed: Option<DateTime<Utc>>,
}

impl ImportRow {
    fn from_record(record: &StringRecord, columns: &ColumnMap, imported_at: DateTime<Utc>) -> Self {
        let text = |column| columns.get(record, column).map(str::to_string);

        let status = normalize_status(columns.get(record, Column::Status));
        let created = columns
            .get(record, Column::CreatedTime)
            .and_then(parse_datetime)
            .unwrap_or(imported_at);
        let closed = match status {
            QueryStatus::Open => None,
            QueryStatus::Closed => Some(
                columns
                    .get(record, Column::ClosedTime)
                    .and_then(parse_datetime)
                    .map_or(created, |closed| closed.max(created)),
            ),
        };

        ImportRow {
            mail_id: text(Column::MailId),
            mobile_number: text(Column::MobileNumber),
            heading: text(Column::Heading),
            description: text(Column::Description),
            status,
            created,
            closed,
        }
    }
}

/// Import every row of a CSV file at `path`.
pub fn import_path(db: &Database, path: &Path) -> Result<ImportReport, ImportError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    import_csv(db, file)
}

/// Import every row readable from `reader`. Header problems abort before
/// anything is written; the rows themselves land in one transaction.
pub fn import_csv<R: io::Read>(db: &Database, reader: R) -> Result<ImportReport, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = ColumnMap::from_headers(rdr.headers()?)?;

    let imported_at = now();
    let mut rows = Vec::new();
    for record in rdr.records() {
        rows.push(ImportRow::from_record(&record?, &columns, imported_at));
    }

    let report = db.with_conn_mut(|conn| {
        let tx = begin_write(conn)?;
        let mut report = ImportReport::default();

        for row in &rows {
            let Some(mail_id) = row.mail_id.as_deref() else {
                warn!("Skipping CSV row without mail_id");
                report.rejected += 1;
                continue;
            };

            match tx.execute(
                "INSERT INTO client_queries
                    (mail_id, mobile_number, query_heading, query_description,
                     status, query_created_time, query_closed_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    mail_id,
                    row.mobile_number,
                    row.heading,
                    row.description,
                    row.status.as_str(),
                    format_timestamp(row.created),
                    row.closed.map(format_timestamp),
                ],
            ) {
                Err(e) if is_unique_violation(&e) => {
                    debug!("Skipping duplicate query from {}", mail_id);
                    report.duplicates += 1;
                }
                result => {
                    result?;
                    report.inserted += 1;
                }
            }
        }

        tx.commit()?;
        Ok(report)
    })?;

    info!(
        "Imported {} queries ({} duplicates, {} rejected)",
        report.inserted, report.duplicates, report.rejected
    );
    Ok(report)
}

/// Case-insensitive. Closed and Resolved are terminal; anything else
/// (In Progress, blank) imports as Open.
fn normalize_status(raw: Option<&str>) -> QueryStatus {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("closed") | Some("resolved") => QueryStatus::Closed,
        _ => QueryStatus::Open,
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}
