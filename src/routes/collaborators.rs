use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{CollaboratorView, TripCollaborator};
use crate::policy;
use crate::realtime::TripEvent;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips/{id}/collaborators", get(list_collaborators))
        .route(
            "/trips/{id}/collaborators/{user_id}",
            delete(remove_collaborator),
        )
}

async fn list_collaborators(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    policy::fetch_trip(&state.db, &trip_id).await?;
    policy::require_member(&state.db, &trip_id, &user.email).await?;

    let collaborators: Vec<TripCollaborator> = sqlx::query_as(
        "SELECT * FROM trip_collaborators WHERE trip_id = ? ORDER BY joined_at",
    )
    .bind(&trip_id)
    .fetch_all(&state.db)
    .await?;

    let views: Vec<CollaboratorView> = collaborators.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

/// Owner-only removal. Tasks already assigned to the removed member are left
/// untouched: orphaned assignments are audit history, surfaced as-is.
async fn remove_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((trip_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let trip = policy::fetch_trip(&state.db, &trip_id).await?;
    policy::require_owner(&state.db, &trip_id, &user.email).await?;

    if user_id == trip.owner_id {
        return Err(AppError::Forbidden("The trip owner cannot be removed"));
    }

    let result =
        sqlx::query("DELETE FROM trip_collaborators WHERE trip_id = ? AND user_id = ?")
            .bind(&trip_id)
            .bind(&user_id)
            .execute(&state.db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Collaborator"));
    }

    state.hub.publish(
        &trip_id,
        TripEvent::MemberRemoved {
            trip_id: trip_id.clone(),
            user_id,
        },
    );

    Ok(StatusCode::NO_CONTENT)
}
