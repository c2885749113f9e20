use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::AppState;
use crate::auth::{AuthUser, login_user, logout_user};
use crate::error::AppError;
use crate::models::User;

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Credential-less login: identity provisioning lives outside this service,
/// so a session is minted for whatever email the family member signs in
/// with, upserting their account row on the way.
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !req.email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    let user = User::new(req.email, req.name.trim().to_string());

    sqlx::query(
        r#"
        INSERT INTO users (email, name, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(email) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at
        "#,
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(&state.db)
    .await?;

    login_user(&session, user.clone()).await?;

    Ok(Json(user))
}

async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    logout_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(user)
}
