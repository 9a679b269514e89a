use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

/// Why an action fell outside its server-computed time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindowViolation {
    RegistrationNotOpen,
    RegistrationClosed,
    NotActive,
    TournamentEnded,
}

impl TimeWindowViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindowViolation::RegistrationNotOpen => "registration_not_open",
            TimeWindowViolation::RegistrationClosed => "registration_closed",
            TimeWindowViolation::NotActive => "not_active",
            TimeWindowViolation::TournamentEnded => "tournament_ended",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User is not registered for this tournament")]
    NotRegistered,

    #[error("Action is outside its allowed time window: {0:?}")]
    InvalidTimeWindow(TimeWindowViolation),

    #[error("User is already registered for this tournament")]
    AlreadyRegistered,

    #[error("Attempt has already been submitted")]
    AlreadySubmitted,

    #[error("No active attempt exists for this tournament")]
    NoActiveAttempt,

    #[error("Malformed answer payload: {0}")]
    MalformedAnswerPayload(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code. Clients branch on this to decide
    /// between "go register", "go to results" and "retry later".
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration_error",
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::NotRegistered => "not_registered",
            Error::InvalidTimeWindow(_) => "invalid_time_window",
            Error::AlreadyRegistered => "already_registered",
            Error::AlreadySubmitted => "already_submitted",
            Error::NoActiveAttempt => "no_active_attempt",
            Error::MalformedAnswerPayload(_) => "malformed_answer_payload",
            Error::RateLimited { .. } => "rate_limited",
            Error::Database(_) => "database_error",
            Error::Validation(_) => "validation_error",
            Error::Json(_) => "invalid_json",
            Error::Anyhow(_) => "internal_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();
        let (status, message) = match &self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::NotRegistered => (
                StatusCode::FORBIDDEN,
                "You are not registered for this tournament".to_string(),
            ),
            Error::InvalidTimeWindow(reason) => {
                let body = Json(json!({
                    "error": code,
                    "reason": reason.as_str(),
                }));
                return (StatusCode::FORBIDDEN, body).into_response();
            }
            Error::AlreadyRegistered => (
                StatusCode::CONFLICT,
                "Already registered for this tournament".to_string(),
            ),
            Error::AlreadySubmitted => (
                StatusCode::CONFLICT,
                "This attempt has already been submitted".to_string(),
            ),
            Error::NoActiveAttempt => (
                StatusCode::NOT_FOUND,
                "No active attempt for this tournament".to_string(),
            ),
            Error::MalformedAnswerPayload(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::RateLimited { retry_after_secs } => {
                let body = Json(json!({
                    "error": code,
                    "retry_after_secs": retry_after_secs,
                }));
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after_secs.to_string())],
                    body,
                )
                    .into_response();
            }
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Database(err) => {
                tracing::error!(error = ?err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred".to_string(),
                )
            }
            Error::Config(_) | Error::Internal(_) | Error::Anyhow(_) => {
                tracing::error!(error = %self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": code, "message": message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
