use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use helpdesk_db::StoreResult;
use helpdesk_types::api::{Claims, ListQueriesParams, SubmitQueryRequest, SubmitQueryResponse};
use helpdesk_types::models::{ClientQuery, QueryId, QueryStatus, Role};

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::middleware::require_role;

/// POST /queries: a client raises a new query.
pub async fn submit_query(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitQueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Client)?;

    let query_id = run_blocking(&state, move |db| {
        db.queries().submit(
            &req.mail_id,
            req.mobile_number.as_deref(),
            req.query_heading.as_deref(),
            req.query_description.as_deref(),
        )
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitQueryResponse {
            query_id,
            status: QueryStatus::Open,
        }),
    ))
}

/// GET /queries?status=Open: the support queue, oldest first.
pub async fn list_queries(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ListQueriesParams>,
) -> Result<Json<Vec<ClientQuery>>, ApiError> {
    require_role(&claims, Role::Support)?;

    let queries = run_blocking(&state, move |db| {
        db.queries()
            .list_by_status(params.status)
            .iter()
            .collect::<StoreResult<Vec<_>>>()
    })
    .await?;

    Ok(Json(queries))
}

/// POST /queries/{query_id}/close
pub async fn close_query(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(query_id): Path<QueryId>,
) -> Result<Json<ClientQuery>, ApiError> {
    require_role(&claims, Role::Support)?;

    let closed = run_blocking(&state, move |db| db.queries().close(query_id)).await?;
    Ok(Json(closed))
}

/// GET /clients/{mail_id}/queries: one client's history, any status.
pub async fn client_queries(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(mail_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Support)?;

    let queries = run_blocking(&state, move |db| db.queries().get_by_mail(&mail_id)).await?;
    Ok(Json(queries))
}

/// GET /queries/metrics
pub async fn metrics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Support)?;

    let metrics = run_blocking(&state, |db| db.queries().metrics()).await?;
    Ok(Json(metrics))
}

/// GET /support-users
pub async fn support_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Support)?;

    let names = run_blocking(&state, |db| db.users().list_support_usernames()).await?;
    Ok(Json(names))
}
