use serde::{Deserialize, Serialize};

use crate::models::{QueryId, QueryStatus, Role, UserId};

// -- JWT Claims --

/// JWT claims issued at login. The role travels with the token so handlers
/// can authorize without a storage round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// Parsed server-side so an unknown role maps to a domain error.
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub token: String,
}

// -- Queries --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitQueryRequest {
    pub mail_id: String,
    pub mobile_number: Option<String>,
    pub query_heading: Option<String>,
    pub query_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQueryResponse {
    pub query_id: QueryId,
    pub status: QueryStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListQueriesParams {
    #[serde(default)]
    pub status: QueryStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
