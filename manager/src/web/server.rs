use crate::web::{handlers, AppState};
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub async fn start_web_server(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // === BACKUP ROUTES ===
        .route(
            "/api/backups",
            post(handlers::create_backup).get(handlers::list_backups),
        )
        .route("/api/backups/stats", get(handlers::get_backup_stats))
        .route("/api/backups/cleanup", post(handlers::cleanup_old_backups))
        .route(
            "/api/backups/{backup_id}",
            get(handlers::get_backup).delete(handlers::delete_backup),
        )
        .route(
            "/api/backups/{backup_id}/tables",
            get(handlers::get_recovery_options),
        )
        .route(
            "/api/backups/{backup_id}/verify",
            post(handlers::verify_backup),
        )
        // === RESTORE ROUTES ===
        .route(
            "/api/backups/{backup_id}/restore",
            post(handlers::restore_backup),
        )
        .route(
            "/api/backups/{backup_id}/restore-tables",
            post(handlers::restore_tables),
        )
        // === OPERATION ROUTES ===
        .route("/api/operations/active", get(handlers::get_active_operations))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
