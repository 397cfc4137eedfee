//! Database row types and the column codecs shared by the stores.
//! Distinct from helpdesk-types models so the hash stays inside this crate.
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use helpdesk_types::models::{ClientQuery, QueryId, QueryStatus, Role, User, UserId};
use rusqlite::Row;
use rusqlite::types::Type;

use crate::{StoreError, StoreResult};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub(crate) const USER_COLUMNS: &str = "user_id, username, hashed_password, role";

pub(crate) const QUERY_COLUMNS: &str = "query_id, mail_id, mobile_number, query_heading, \
     query_description, status, query_created_time, query_closed_time";

pub struct UserRow {
    pub user_id: i64,
    pub username: String,
    pub hashed_password: String,
    pub role: Role,
}

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserRow {
            user_id: row.get(0)?,
            username: row.get(1)?,
            hashed_password: row.get(2)?,
            role: parse_column::<Role>(row, 3)?,
        })
    }

    pub fn into_user(self) -> User {
        User {
            user_id: UserId::from_row(self.user_id),
            username: self.username,
            role: self.role,
        }
    }
}

/// Maps a row selected with [`QUERY_COLUMNS`].
pub(crate) fn client_query_from_row(row: &Row<'_>) -> rusqlite::Result<ClientQuery> {
    Ok(ClientQuery {
        query_id: QueryId::from_row(row.get(0)?),
        mail_id: row.get(1)?,
        mobile_number: row.get(2)?,
        query_heading: row.get(3)?,
        query_description: row.get(4)?,
        status: parse_column::<QueryStatus>(row, 5)?,
        query_created_time: timestamp_column(row, 6)?,
        query_closed_time: optional_timestamp_column(row, 7)?,
    })
}

/// Current time at the precision stored on disk, so values handed back to
/// callers compare equal to what a later read returns.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width UTC text; sorts lexicographically in time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| bad_timestamp(idx, &raw))
}

fn optional_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_timestamp(&raw).ok_or_else(|| bad_timestamp(idx, &raw)))
        .transpose()
}

fn bad_timestamp(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid timestamp '{}'", raw).into(),
    )
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_survive_storage_format() {
        let ts = now();
        assert_eq!(parse_timestamp(&format_timestamp(ts)), Some(ts));
    }

    #[test]
    fn timestamp_text_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }

    #[test]
    fn parse_accepts_whole_seconds() {
        let parsed = parse_timestamp("2024-03-01 10:20:30").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap());
        assert!(parse_timestamp("not a time").is_none());
    }
}
