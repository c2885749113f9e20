//! Central authorization gate. Every mutating route re-derives the caller's
//! role from the collaborator table and re-checks the needed capability here,
//! instead of trusting that the UI already did.

use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{Role, TripPermissions, TripRow, permissions_for_role};

/// Load a trip or fail with a distinct 404, so "doesn't exist" never blurs
/// into "not allowed".
pub async fn fetch_trip(db: &SqlitePool, trip_id: &str) -> Result<TripRow, AppError> {
    let trip: Option<TripRow> = sqlx::query_as("SELECT * FROM trips WHERE id = ?")
        .bind(trip_id)
        .fetch_optional(db)
        .await?;

    trip.ok_or(AppError::NotFound("Trip"))
}

pub async fn role_for(
    db: &SqlitePool,
    trip_id: &str,
    user_id: &str,
) -> Result<Option<Role>, AppError> {
    let role: Option<(Role,)> = sqlx::query_as(
        "SELECT role FROM trip_collaborators WHERE trip_id = ? AND user_id = ?",
    )
    .bind(trip_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    Ok(role.map(|(r,)| r))
}

/// The caller must at least be on the trip's collaborator list.
pub async fn require_member(
    db: &SqlitePool,
    trip_id: &str,
    user_id: &str,
) -> Result<Role, AppError> {
    role_for(db, trip_id, user_id)
        .await?
        .ok_or(AppError::Forbidden("You are not a member of this trip"))
}

/// The caller must be a member whose derived permissions satisfy `cap`.
pub async fn require_capability(
    db: &SqlitePool,
    trip_id: &str,
    user_id: &str,
    cap: fn(&TripPermissions) -> bool,
    denied: &'static str,
) -> Result<Role, AppError> {
    let role = require_member(db, trip_id, user_id).await?;
    if cap(&permissions_for_role(role)) {
        Ok(role)
    } else {
        Err(AppError::Forbidden(denied))
    }
}

pub async fn require_owner(
    db: &SqlitePool,
    trip_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    match require_member(db, trip_id, user_id).await? {
        Role::Owner => Ok(()),
        _ => Err(AppError::Forbidden("Only the trip owner can do this")),
    }
}
