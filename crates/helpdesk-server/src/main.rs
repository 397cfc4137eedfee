use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use helpdesk_api::auth::{AppState, AppStateInner};
use helpdesk_db::{Database, DbConfig};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helpdesk=debug,helpdesk_api=debug,helpdesk_db=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("HELPDESK_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: HELPDESK_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let host = std::env::var("HELPDESK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HELPDESK_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let db_config = DbConfig::from_env()?;

    // Init database
    let db = Database::open(&db_config)?;
    let state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    let app = helpdesk_api::router(state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Helpdesk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release the connection pool once every request has finished
    match Arc::try_unwrap(state) {
        Ok(inner) => inner.db.close()?,
        Err(_) => warn!("Database still shared at shutdown; dropping without explicit close"),
    }

    info!("Helpdesk server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
