use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    CollaboratorView, NewTrip, Role, Trip, TripCollaborator, TripInvite, TripRow, TripUpdate,
};
use crate::policy;
use crate::realtime::TripEvent;

/// The full shared document: trip envelope plus the membership and invite
/// sub-collections the SPA renders.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDetail {
    pub trip: Trip,
    pub collaborators: Vec<CollaboratorView>,
    pub invites: Vec<TripInvite>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/{id}", get(show_trip).patch(update_trip))
}

pub async fn load_detail(state: &AppState, trip: Trip) -> Result<TripDetail, AppError> {
    let collaborators: Vec<TripCollaborator> = sqlx::query_as(
        "SELECT * FROM trip_collaborators WHERE trip_id = ? ORDER BY joined_at",
    )
    .bind(&trip.id)
    .fetch_all(&state.db)
    .await?;

    let invites: Vec<TripInvite> = sqlx::query_as(
        "SELECT * FROM trip_invites WHERE trip_id = ? ORDER BY created_at",
    )
    .bind(&trip.id)
    .fetch_all(&state.db)
    .await?;

    Ok(TripDetail {
        trip,
        collaborators: collaborators.into_iter().map(Into::into).collect(),
        invites,
    })
}

async fn list_trips(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let rows: Vec<TripRow> = sqlx::query_as(
        r#"
        SELECT t.* FROM trips t
        JOIN trip_collaborators tc ON tc.trip_id = t.id
        WHERE tc.user_id = ?
        ORDER BY t.created_at
        "#,
    )
    .bind(&user.email)
    .fetch_all(&state.db)
    .await?;

    let trips: Vec<Trip> = rows.into_iter().map(TripRow::into_trip).collect();
    Ok(Json(trips))
}

/// Creating a trip is the one place an `owner` collaborator row is ever
/// written; every later member arrives through the invite flow with a
/// lesser role.
async fn create_trip(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(new): Json<NewTrip>,
) -> Result<impl IntoResponse, AppError> {
    if new.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if new.destination.trim().is_empty() {
        return Err(AppError::Validation("Destination is required".to_string()));
    }

    let trip = Trip::new(user.email.clone(), new);
    let owner = TripCollaborator::new(
        trip.id.clone(),
        user.email.clone(),
        user.name.clone(),
        Role::Owner,
    );

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO trips (id, owner_id, title, destination, start_date, end_date, is_shared,
                           version, last_modified, modified_by, data, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&trip.id)
    .bind(&trip.owner_id)
    .bind(&trip.title)
    .bind(&trip.destination)
    .bind(&trip.start_date)
    .bind(&trip.end_date)
    .bind(trip.is_shared)
    .bind(trip.version)
    .bind(&trip.last_modified)
    .bind(&trip.modified_by)
    .bind(trip.data_json())
    .bind(&trip.created_at)
    .bind(&trip.updated_at)
    .execute(&mut *tx)
    .await?;

    insert_collaborator(&mut tx, &owner).await?;

    tx.commit().await?;

    let detail = load_detail(&state, trip).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn show_trip(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let row = policy::fetch_trip(&state.db, &id).await?;
    policy::require_member(&state.db, &id, &user.email).await?;

    let detail = load_detail(&state, row.into_trip()).await?;
    Ok(Json(detail))
}

/// Apply a partial update to the shared document. Last-write-wins at this
/// granularity: overlapping fields from concurrent editors resolve to
/// whichever write commits later, but the version counter advances once per
/// accepted write no matter the interleaving.
async fn update_trip(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(update): Json<TripUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let row = policy::fetch_trip(&state.db, &id).await?;
    policy::require_capability(
        &state.db,
        &id,
        &user.email,
        |p| p.can_edit,
        "You do not have permission to edit this trip",
    )
    .await?;

    if update.is_empty() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }

    let mut trip = row.into_trip();
    trip.apply(update, &user.email);

    sqlx::query(
        r#"
        UPDATE trips
        SET title = ?, destination = ?, start_date = ?, end_date = ?, is_shared = ?,
            data = ?, version = version + 1, last_modified = ?, modified_by = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&trip.title)
    .bind(&trip.destination)
    .bind(&trip.start_date)
    .bind(&trip.end_date)
    .bind(trip.is_shared)
    .bind(trip.data_json())
    .bind(&trip.last_modified)
    .bind(&trip.modified_by)
    .bind(&trip.updated_at)
    .bind(&id)
    .execute(&state.db)
    .await?;

    // Rebroadcast the authoritative committed document, not our local merge.
    let fresh = policy::fetch_trip(&state.db, &id).await?.into_trip();
    state.hub.publish(
        &id,
        TripEvent::TripUpdated {
            trip: Box::new(fresh.clone()),
        },
    );

    Ok(Json(fresh))
}

pub async fn insert_collaborator(
    tx: &mut sqlx::SqliteConnection,
    collaborator: &TripCollaborator,
) -> Result<(), AppError> {
    // Idempotent upsert keyed by (trip, user). The owner guard keeps a
    // re-accepted invite from ever demoting the trip's owner.
    sqlx::query(
        r#"
        INSERT INTO trip_collaborators (trip_id, user_id, email, name, role, joined_at, last_active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(trip_id, user_id) DO UPDATE
            SET name = excluded.name, role = excluded.role, last_active = excluded.last_active
            WHERE trip_collaborators.role != 'owner'
        "#,
    )
    .bind(&collaborator.trip_id)
    .bind(&collaborator.user_id)
    .bind(&collaborator.email)
    .bind(&collaborator.name)
    .bind(&collaborator.role)
    .bind(&collaborator.joined_at)
    .bind(&collaborator.last_active)
    .execute(tx)
    .await?;

    Ok(())
}
