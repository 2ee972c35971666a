use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failure of a single sync operation. Passes turn these into a [`SkipReason`]
/// at the item boundary; only store failures outside any item abort a pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("{entity} detail has no external id")]
    MissingExternalId { entity: &'static str },

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("time error: {0}")]
    Time(#[from] jiff::Error),
}

impl From<wreq::Error> for SyncError {
    fn from(err: wreq::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Why one item of a pass was not applied.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed(String),
    MissingExternalId(&'static str),
    Store(String),
    Serialize(String),
}

impl SkipReason {
    /// Transient fetch failures are expected noise; everything else is an error.
    pub fn is_error(&self) -> bool {
        !matches!(self, SkipReason::FetchFailed(_))
    }
}

impl From<SyncError> for SkipReason {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Fetch(msg) => SkipReason::FetchFailed(msg),
            SyncError::MissingExternalId { entity } => SkipReason::MissingExternalId(entity),
            SyncError::Db(e) => SkipReason::Store(e.to_string()),
            SyncError::Io(e) => SkipReason::Serialize(e.to_string()),
            SyncError::Json(e) => SkipReason::Serialize(e.to_string()),
            SyncError::Time(e) => SkipReason::Store(e.to_string()),
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::FetchFailed(msg) => write!(f, "fetch failed: {msg}"),
            SkipReason::MissingExternalId(entity) => write!(f, "{entity} has no external id"),
            SkipReason::Store(msg) => write!(f, "store error: {msg}"),
            SkipReason::Serialize(msg) => write!(f, "serialize error: {msg}"),
        }
    }
}

#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self(anyhow::Error::new(err))
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        Self(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
