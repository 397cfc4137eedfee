pub mod auth;
pub mod error;
pub mod middleware;
pub mod queries;

use axum::{
    Router,
    routing::{get, post},
};

use crate::auth::AppState;

/// All helpdesk routes. Everything except `/auth/*` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/queries", post(queries::submit_query).get(queries::list_queries))
        .route("/queries/metrics", get(queries::metrics))
        .route("/queries/{query_id}/close", post(queries::close_query))
        .route("/clients/{mail_id}/queries", get(queries::client_queries))
        .route("/support-users", get(queries::support_users))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use helpdesk_db::{Database, DbConfig};

    use super::*;
    use crate::auth::AppStateInner;

    fn test_app() -> (TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&DbConfig::new(dir.path().join("helpdesk.db"))).unwrap();
        let state = Arc::new(AppStateInner {
            db,
            jwt_secret: "test-secret".into(),
        });
        (dir, router(state))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str, role: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": username, "password": "password123", "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn register_and_login_carry_role() {
        let (_dir, app) = test_app();
        register(&app, "agent", "Support").await;

        let (status, body) = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "agent", "password": "password123" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "agent");
        assert_eq!(body["role"], "Support");
        assert!(body["token"].as_str().is_some());
    }

    #[tokio::test]
    async fn duplicate_and_invalid_registrations() {
        let (_dir, app) = test_app();
        register(&app, "client", "Client").await;

        let (status, _) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "client", "password": "password123", "role": "Client" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "boss", "password": "password123", "role": "Admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid role"));
    }

    #[tokio::test]
    async fn registration_lengths_count_characters() {
        let (_dir, app) = test_app();
        let attempt = async |username: &str, password: &str| {
            send(
                &app,
                "POST",
                "/auth/register",
                None,
                Some(json!({ "username": username, "password": password, "role": "Client" })),
            )
            .await
            .0
        };

        // 2 characters, 6 bytes
        assert_eq!(attempt("日本", "password123").await, StatusCode::BAD_REQUEST);
        // 32 characters, 64 bytes
        assert_eq!(attempt(&"ä".repeat(32), "password123").await, StatusCode::CREATED);
        // 4 characters, 12 bytes
        assert_eq!(attempt("zoë", "密码密码").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_credentials_are_indistinguishable() {
        let (_dir, app) = test_app();
        register(&app, "client", "Client").await;

        let wrong_password = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "client", "password": "not-the-password" })),
        )
        .await;
        let unknown_user = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "ghost", "password": "password123" })),
        )
        .await;

        assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password, unknown_user);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let (_dir, app) = test_app();

        let (status, _) = send(&app, "GET", "/queries", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "GET", "/queries", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn client_submits_and_support_closes() {
        let (_dir, app) = test_app();
        let client = register(&app, "client", "Client").await;
        let support = register(&app, "agent", "Support").await;

        let (status, body) = send(
            &app,
            "POST",
            "/queries",
            Some(&client),
            Some(json!({ "mail_id": "a@x.com", "query_heading": "Login issue" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "Open");
        let query_id = body["query_id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            "POST",
            "/queries",
            Some(&client),
            Some(json!({ "mail_id": "a@x.com", "query_heading": "Login issue" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Clients cannot see the queue
        let (status, _) = send(&app, "GET", "/queries", Some(&client), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, open) = send(&app, "GET", "/queries?status=Open", Some(&support), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(open.as_array().unwrap().len(), 1);

        let close_uri = format!("/queries/{}/close", query_id);
        let (status, closed) = send(&app, "POST", &close_uri, Some(&support), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["status"], "Closed");
        assert!(!closed["query_closed_time"].is_null());

        let (status, _) = send(&app, "POST", &close_uri, Some(&support), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, "POST", "/queries/999/close", Some(&support), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, closed_list) =
            send(&app, "GET", "/queries?status=Closed", Some(&support), None).await;
        assert_eq!(closed_list[0]["query_id"].as_i64(), Some(query_id));

        let (_, history) = send(&app, "GET", "/clients/a@x.com/queries", Some(&support), None).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn support_dashboard_endpoints() {
        let (_dir, app) = test_app();
        let client = register(&app, "client", "Client").await;
        let support = register(&app, "agent", "Support").await;
        send(
            &app,
            "POST",
            "/queries",
            Some(&client),
            Some(json!({ "mail_id": "a@x.com", "query_heading": "One" })),
        )
        .await;

        let (status, metrics) = send(&app, "GET", "/queries/metrics", Some(&support), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(metrics["total"], 1);
        assert_eq!(metrics["open"], 1);
        assert_eq!(metrics["closed"], 0);

        let (status, names) = send(&app, "GET", "/support-users", Some(&support), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names, json!(["agent"]));

        let (status, _) = send(&app, "GET", "/queries/metrics", Some(&client), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
