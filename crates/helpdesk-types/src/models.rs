use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// -- Identifiers --

/// Storage-generated identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Storage-generated identifier of a client query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(i64);

macro_rules! row_id {
    ($name:ident) => {
        impl $name {
            /// Wraps a rowid read back from storage.
            pub fn from_row(id: i64) -> Self {
                Self(id)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(UserId);
row_id!(QueryId);

// -- Role --

/// Access class of an account. Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Submits queries.
    Client,
    /// Resolves queries.
    Support,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role: '{0}'")]
pub struct ParseRoleError(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Support => "Support",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "support" => Ok(Role::Support),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

// -- Query status --

/// Lifecycle state of a client query. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QueryStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid query status: '{0}'")]
pub struct ParseStatusError(pub String);

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Open => "Open",
            QueryStatus::Closed => "Closed",
        }
    }

    /// The only transition is Open -> Closed.
    pub fn can_transition_to(&self, target: QueryStatus) -> bool {
        matches!((self, target), (QueryStatus::Open, QueryStatus::Closed))
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(QueryStatus::Open),
            "closed" => Ok(QueryStatus::Closed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

// -- Records --

/// An account as seen by callers. The password hash never leaves storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

/// A support ticket submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientQuery {
    pub query_id: QueryId,
    pub mail_id: String,
    pub mobile_number: Option<String>,
    pub query_heading: Option<String>,
    pub query_description: Option<String>,
    pub status: QueryStatus,
    pub query_created_time: DateTime<Utc>,
    pub query_closed_time: Option<DateTime<Utc>>,
}

/// Aggregate view of the support queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
    pub total: u64,
    pub open: u64,
    pub closed: u64,
    /// Mean seconds from creation to closure over closed queries.
    pub avg_resolution_secs: Option<f64>,
}
