use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use helpdesk_db::{Database, StoreError, StoreResult};
use helpdesk_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use helpdesk_types::models::{Role, UserId};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::internal(format!("spawn_blocking join error: {}", e)))?;
    Ok(result?)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if !(3..=32).contains(&req.username.chars().count()) {
        return Err(ApiError::bad_request("username must be 3 to 32 characters"));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }
    let role: Role = req.role.parse().map_err(StoreError::from)?;

    let RegisterRequest {
        username, password, ..
    } = req;
    let name = username.clone();
    let user_id = run_blocking(&state, move |db| {
        db.users().register(&username, &password, role)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, &name, role).map_err(ApiError::internal)?;

    info!("New {} account: {}", role, name);
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let LoginRequest { username, password } = req;
    let user = run_blocking(&state, move |db| {
        db.users().authenticate(&username, &password)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.user_id, &user.username, user.role)
        .map_err(ApiError::internal)?;

    Ok(Json(LoginResponse {
        user_id: user.user_id,
        username: user.username,
        role: user.role,
        token,
    }))
}

fn create_token(secret: &str, user_id: UserId, username: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
