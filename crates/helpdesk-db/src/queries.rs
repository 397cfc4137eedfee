use std::collections::VecDeque;

use helpdesk_types::models::{ClientQuery, QueryId, QueryMetrics, QueryStatus};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::is_unique_violation;
use crate::models::{OptionalExt, QUERY_COLUMNS, client_query_from_row, format_timestamp, now};
use crate::{Database, StoreError, StoreResult, begin_write};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Client query submission and the Open -> Closed lifecycle.
pub struct QueryStore<'a> {
    db: &'a Database,
}

impl<'a> QueryStore<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a new Open query. A client cannot reuse a heading (compared on
    /// its first 120 characters).
    pub fn submit(
        &self,
        mail_id: &str,
        mobile_number: Option<&str>,
        query_heading: Option<&str>,
        query_description: Option<&str>,
    ) -> StoreResult<QueryId> {
        if mail_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("mail_id must not be empty"));
        }

        let created = format_timestamp(now());
        let query_id = self.db.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;
            match tx.execute(
                "INSERT INTO client_queries
                    (mail_id, mobile_number, query_heading, query_description, status, query_created_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    mail_id,
                    mobile_number,
                    query_heading,
                    query_description,
                    QueryStatus::Open.as_str(),
                    created,
                ],
            ) {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::DuplicateQuery {
                        mail_id: mail_id.to_string(),
                    });
                }
                result => {
                    result?;
                }
            }
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(QueryId::from_row(id))
        })?;

        info!("Query {} submitted by {}", query_id, mail_id);
        Ok(query_id)
    }

    pub fn get(&self, query_id: QueryId) -> StoreResult<ClientQuery> {
        self.db
            .with_conn(|conn| query_by_id(conn, query_id))?
            .ok_or(StoreError::NotFound(query_id))
    }

    /// Close an Open query and stamp its closed time. Closing twice is an
    /// error and leaves the first closed time in place.
    pub fn close(&self, query_id: QueryId) -> StoreResult<ClientQuery> {
        let closed = self.db.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;

            let current = query_by_id(&tx, query_id)?.ok_or(StoreError::NotFound(query_id))?;
            if !current.status.can_transition_to(QueryStatus::Closed) {
                return Err(StoreError::AlreadyClosed(query_id));
            }

            // closed time never precedes created time, even if the clock stepped back
            let closed_at = now().max(current.query_created_time);
            let updated = tx.execute(
                "UPDATE client_queries SET status = ?1, query_closed_time = ?2
                 WHERE query_id = ?3 AND status = ?4",
                rusqlite::params![
                    QueryStatus::Closed.as_str(),
                    format_timestamp(closed_at),
                    query_id.get(),
                    QueryStatus::Open.as_str(),
                ],
            )?;
            if updated != 1 {
                return Err(StoreError::AlreadyClosed(query_id));
            }
            tx.commit()?;

            Ok(ClientQuery {
                status: QueryStatus::Closed,
                query_closed_time: Some(closed_at),
                ..current
            })
        })?;

        info!("Query {} closed", query_id);
        Ok(closed)
    }

    /// All queries in `status`, oldest first. Nothing is read until the
    /// listing is iterated, and each `iter()` starts again from the oldest.
    pub fn list_by_status(&self, status: QueryStatus) -> QueryListing<'a> {
        QueryListing {
            db: self.db,
            status,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Every query submitted by one client, oldest first.
    pub fn get_by_mail(&self, mail_id: &str) -> StoreResult<Vec<ClientQuery>> {
        let queries = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM client_queries
                 WHERE mail_id = ?1
                 ORDER BY query_created_time, query_id",
                QUERY_COLUMNS
            ))?;
            let rows = stmt
                .query_map([mail_id], client_query_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        debug!("Found {} queries for {}", queries.len(), mail_id);
        Ok(queries)
    }

    /// Counts per status and the mean time to close.
    pub fn metrics(&self) -> StoreResult<QueryMetrics> {
        self.db.with_conn(|conn| {
            let metrics = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'Open'), 0),
                        COALESCE(SUM(status = 'Closed'), 0),
                        AVG(CASE WHEN status = 'Closed' AND query_closed_time IS NOT NULL
                            THEN (julianday(query_closed_time) - julianday(query_created_time)) * 86400.0
                            END)
                 FROM client_queries",
                [],
                |row| {
                    Ok(QueryMetrics {
                        total: row.get::<_, i64>(0)? as u64,
                        open: row.get::<_, i64>(1)? as u64,
                        closed: row.get::<_, i64>(2)? as u64,
                        avg_resolution_secs: row.get(3)?,
                    })
                },
            )?;
            Ok(metrics)
        })
    }
}

fn query_by_id(conn: &Connection, query_id: QueryId) -> StoreResult<Option<ClientQuery>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM client_queries WHERE query_id = ?1",
        QUERY_COLUMNS
    ))?;

    let row = stmt
        .query_row([query_id.get()], client_query_from_row)
        .optional()?;

    Ok(row)
}

/// Lazy, restartable view over the queries in one status.
pub struct QueryListing<'a> {
    db: &'a Database,
    status: QueryStatus,
    page_size: usize,
}

impl<'a> QueryListing<'a> {
    /// Rows fetched per round-trip.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn iter(&self) -> QueryIter<'a> {
        QueryIter {
            db: self.db,
            status: self.status,
            page_size: self.page_size,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }
}

impl<'a> IntoIterator for &QueryListing<'a> {
    type Item = StoreResult<ClientQuery>;
    type IntoIter = QueryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Keyset-paginated cursor over `(query_created_time, query_id)`. The reader
/// lock is held only while a page is fetched.
pub struct QueryIter<'a> {
    db: &'a Database,
    status: QueryStatus,
    page_size: usize,
    buffer: VecDeque<ClientQuery>,
    cursor: Option<(String, i64)>,
    exhausted: bool,
}

impl QueryIter<'_> {
    fn fetch_page(&self) -> StoreResult<Vec<ClientQuery>> {
        let limit = self.page_size as i64;
        self.db.with_conn(|conn| {
            let rows = match &self.cursor {
                None => {
                    let mut stmt = conn.prepare_cached(&format!(
                        "SELECT {} FROM client_queries
                         WHERE status = ?1
                         ORDER BY query_created_time, query_id
                         LIMIT ?2",
                        QUERY_COLUMNS
                    ))?;
                    let page = stmt
                        .query_map(
                            rusqlite::params![self.status.as_str(), limit],
                            client_query_from_row,
                        )?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    page
                }
                Some((created, id)) => {
                    let mut stmt = conn.prepare_cached(&format!(
                        "SELECT {} FROM client_queries
                         WHERE status = ?1
                           AND (query_created_time, query_id) > (?2, ?3)
                         ORDER BY query_created_time, query_id
                         LIMIT ?4",
                        QUERY_COLUMNS
                    ))?;
                    let page = stmt
                        .query_map(
                            rusqlite::params![self.status.as_str(), created, id, limit],
                            client_query_from_row,
                        )?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    page
                }
            };
            Ok(rows)
        })
    }
}

impl Iterator for QueryIter<'_> {
    type Item = StoreResult<ClientQuery>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(query) = self.buffer.pop_front() {
            return Some(Ok(query));
        }
        if self.exhausted {
            return None;
        }

        match self.fetch_page() {
            Ok(page) => {
                if page.len() < self.page_size {
                    self.exhausted = true;
                }
                if let Some(last) = page.last() {
                    self.cursor = Some((
                        format_timestamp(last.query_created_time),
                        last.query_id.get(),
                    ));
                }
                self.buffer.extend(page);
                self.buffer.pop_front().map(Ok)
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}
