use helpdesk_types::models::{ParseRoleError, QueryId};
use thiserror::Error;

/// Errors surfaced by the user and query stores.
///
/// Storage-engine failures are flattened into `StorageUnavailable` so no
/// `rusqlite` type crosses the store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    #[error("invalid role: '{0}'\n  hint: valid roles are: Client, Support")]
    InvalidRole(String),

    /// Unknown username and wrong password are deliberately the same error.
    #[error("invalid username or password")]
    AuthFailure,

    #[error("a query with this heading was already submitted by {mail_id}")]
    DuplicateQuery { mail_id: String },

    #[error("query not found: {0}")]
    NotFound(QueryId),

    #[error("query already closed: {0}")]
    AlreadyClosed(QueryId),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}

impl From<ParseRoleError> for StoreError {
    fn from(err: ParseRoleError) -> Self {
        StoreError::InvalidRole(err.0)
    }
}

/// True for a UNIQUE (or primary key) violation, the signal that an
/// insert lost a race against an existing row.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _) => {
            sqlite_err.code == rusqlite::ErrorCode::ConstraintViolation
                && (sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
