use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{InviteError, InviteStatus, Role, TripCollaborator, TripInvite};
use crate::policy;
use crate::realtime::TripEvent;
use crate::routes::trips::{insert_collaborator, load_detail};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    email: String,
    role: Role,
    message: Option<String>,
}

/// What the acceptance screen needs before the invitee decides.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitePreview {
    invite: TripInvite,
    trip_title: String,
    trip_destination: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips/{id}/invites", post(create_invite))
        .route("/invites/{token}", get(show_invite))
        .route("/invites/{token}/accept", post(accept_invite))
        .route("/invites/{token}/decline", post(decline_invite))
}

async fn create_invite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(trip_id): Path<String>,
    Json(req): Json<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let trip = policy::fetch_trip(&state.db, &trip_id).await?;
    policy::require_capability(
        &state.db,
        &trip_id,
        &user.email,
        |p| p.can_invite,
        "You do not have permission to invite people to this trip",
    )
    .await?;

    if req.role == Role::Owner {
        return Err(AppError::Validation(
            "Invites can only grant the collaborator or viewer role".to_string(),
        ));
    }
    if !req.email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }

    let invite = TripInvite::new(
        trip_id,
        user.email,
        user.name,
        req.email,
        req.role,
        req.message,
    );

    sqlx::query(
        r#"
        INSERT INTO trip_invites (id, trip_id, inviter_id, inviter_name, invitee_email,
                                  role, token, status, message, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&invite.id)
    .bind(&invite.trip_id)
    .bind(&invite.inviter_id)
    .bind(&invite.inviter_name)
    .bind(&invite.invitee_email)
    .bind(&invite.role)
    .bind(&invite.token)
    .bind(&invite.status)
    .bind(&invite.message)
    .bind(&invite.created_at)
    .bind(&invite.expires_at)
    .execute(&state.db)
    .await?;

    // Fire-and-forget: the invite row is committed and the link works even
    // if the email never arrives.
    let mailer = Arc::clone(&state.mailer);
    let for_email = invite.clone();
    let trip_title = trip.title.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer.send_invite(&for_email, &trip_title).await {
            tracing::warn!(
                to = %for_email.invitee_email,
                "Invite email delivery failed: {e}"
            );
        }
    });

    Ok((StatusCode::CREATED, Json(invite)))
}

async fn fetch_invite(state: &AppState, token: &str) -> Result<TripInvite, AppError> {
    let invite: Option<TripInvite> = sqlx::query_as("SELECT * FROM trip_invites WHERE token = ?")
        .bind(token)
        .fetch_optional(&state.db)
        .await?;

    invite.ok_or(AppError::Invite(InviteError::InvalidToken))
}

/// Lazy expiry: a pending invite found past its deadline is transitioned to
/// `expired` the moment anyone looks at it, so correctness never depends on
/// a background sweep having run.
async fn expire_if_due(state: &AppState, invite: &mut TripInvite) -> Result<(), AppError> {
    if invite.status == InviteStatus::Pending && invite.is_expired_at(Utc::now()) {
        sqlx::query("UPDATE trip_invites SET status = 'expired' WHERE id = ?")
            .bind(&invite.id)
            .execute(&state.db)
            .await?;
        invite.status = InviteStatus::Expired;
    }
    Ok(())
}

/// The deep-link entry point. The token is the only credential needed to
/// look at an invite; accepting still requires a session.
async fn show_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut invite = fetch_invite(&state, &token).await?;
    expire_if_due(&state, &mut invite).await?;

    let trip = policy::fetch_trip(&state.db, &invite.trip_id).await?;

    Ok(Json(InvitePreview {
        invite,
        trip_title: trip.title,
        trip_destination: trip.destination,
    }))
}

async fn accept_invite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut invite = fetch_invite(&state, &token).await?;
    expire_if_due(&state, &mut invite).await?;
    invite.ensure_acceptable_by(&user.email, Utc::now())?;

    let collaborator = TripCollaborator::new(
        invite.trip_id.clone(),
        user.email.clone(),
        user.name.clone(),
        invite.role,
    );

    let now = Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;

    sqlx::query("UPDATE trip_invites SET status = 'accepted' WHERE id = ?")
        .bind(&invite.id)
        .execute(&mut *tx)
        .await?;

    insert_collaborator(&mut tx, &collaborator).await?;

    sqlx::query(
        "UPDATE trips SET version = version + 1, last_modified = ?, modified_by = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&now)
    .bind(&user.email)
    .bind(&now)
    .bind(&invite.trip_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let trip = policy::fetch_trip(&state.db, &invite.trip_id)
        .await?
        .into_trip();

    state.hub.publish(
        &invite.trip_id,
        TripEvent::MemberJoined { collaborator },
    );
    state.hub.publish(
        &invite.trip_id,
        TripEvent::TripUpdated {
            trip: Box::new(trip.clone()),
        },
    );

    let detail = load_detail(&state, trip).await?;
    Ok(Json(detail))
}

async fn decline_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut invite = fetch_invite(&state, &token).await?;
    expire_if_due(&state, &mut invite).await?;
    invite.ensure_pending(Utc::now())?;

    // Declining resolves the invite but touches nothing on the trip itself.
    sqlx::query("UPDATE trip_invites SET status = 'declined' WHERE id = ?")
        .bind(&invite.id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
