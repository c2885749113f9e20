use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::models::InviteError;

#[derive(Debug)]
pub enum AppError {
    Database(sqlx::Error),
    Session(tower_sessions::session::Error),
    NotFound(&'static str),
    Forbidden(&'static str),
    Validation(String),
    Invite(InviteError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            AppError::Forbidden(why) => (StatusCode::FORBIDDEN, (*why).to_string()),
            AppError::Validation(why) => (StatusCode::UNPROCESSABLE_ENTITY, why.clone()),
            // Each invite failure gets its own status so the acceptance
            // screen can tell invalid, used-up and expired links apart.
            AppError::Invite(e) => {
                let status = match e {
                    InviteError::InvalidToken => StatusCode::NOT_FOUND,
                    InviteError::AlreadyProcessed(_) => StatusCode::CONFLICT,
                    InviteError::Expired => StatusCode::GONE,
                    InviteError::EmailMismatch => StatusCode::FORBIDDEN,
                };
                (status, e.to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Session(e) => {
                tracing::error!("Session error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self {
        AppError::Session(e)
    }
}

impl From<InviteError> for AppError {
    fn from(e: InviteError) -> Self {
        AppError::Invite(e)
    }
}
