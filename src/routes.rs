use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;

use crate::{
    error::AppResult,
    scheduler::{JobStatus, StatusBoard},
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub board: StatusBoard,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", get(jobs))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn health(State(state): State<Arc<AppState>>) -> AppResult<&'static str> {
    state.db.ping().await?;
    Ok("ok")
}

pub async fn jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobStatus>> {
    Json(state.board.snapshot().await)
}
