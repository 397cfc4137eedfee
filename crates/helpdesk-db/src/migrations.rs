use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

/// Creates the schema. Safe to run on every open.
pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Helpdesk DB: running migration v1 (users, client_queries)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE IF NOT EXISTS users (
                user_id         INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                hashed_password TEXT NOT NULL,
                role            TEXT NOT NULL CHECK (role IN ('Client', 'Support'))
            );

            CREATE TABLE IF NOT EXISTS client_queries (
                query_id            INTEGER PRIMARY KEY AUTOINCREMENT,
                mail_id             TEXT NOT NULL,
                mobile_number       TEXT,
                query_heading       TEXT,
                query_description   TEXT,
                status              TEXT NOT NULL DEFAULT 'Open'
                                    CHECK (status IN ('Open', 'Closed')),
                query_created_time  TEXT NOT NULL,
                query_closed_time   TEXT
            );

            -- One heading (by its first 120 characters) per client
            CREATE UNIQUE INDEX IF NOT EXISTS uq_client_queries_mail_heading
                ON client_queries(mail_id, substr(query_heading, 1, 120));

            CREATE INDEX IF NOT EXISTS idx_client_queries_status
                ON client_queries(status, query_created_time, query_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
