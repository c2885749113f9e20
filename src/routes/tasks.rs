use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    ReadinessItem, TaskAssignment, TaskComment, enhance_items, task_stats,
};
use crate::policy;
use crate::realtime::TripEvent;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    assigned_to: String,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    content: String,
}

#[derive(Deserialize)]
pub struct ReadinessRequest {
    items: Vec<ReadinessItem>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips/{id}/tasks/{task_id}/assign", post(assign_task))
        .route("/trips/{id}/tasks/{task_id}/unassign", post(unassign_task))
        .route("/trips/{id}/tasks/{task_id}/complete", post(complete_task))
        .route(
            "/trips/{id}/tasks/{task_id}/uncomplete",
            post(uncomplete_task),
        )
        .route(
            "/trips/{id}/tasks/{task_id}/comments",
            get(list_comments).post(add_comment),
        )
        .route("/trips/{id}/readiness", post(enhanced_readiness))
        .route("/trips/{id}/readiness/stats", post(readiness_stats))
}

async fn require_task_manager(
    state: &AppState,
    trip_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    policy::fetch_trip(&state.db, trip_id).await?;
    policy::require_capability(
        &state.db,
        trip_id,
        user_id,
        |p| p.can_manage_tasks,
        "You do not have permission to manage tasks on this trip",
    )
    .await?;
    Ok(())
}

/// Load the ledger row for a task, or start a fresh one. Ledger rows come
/// into existence on first touch; tasks that nobody assigned or completed
/// have no row at all.
async fn load_or_new(
    state: &AppState,
    trip_id: &str,
    task_id: &str,
) -> Result<TaskAssignment, AppError> {
    let existing: Option<TaskAssignment> = sqlx::query_as(
        "SELECT * FROM task_assignments WHERE trip_id = ? AND task_id = ?",
    )
    .bind(trip_id)
    .bind(task_id)
    .fetch_optional(&state.db)
    .await?;

    Ok(existing.unwrap_or_else(|| TaskAssignment::new(trip_id.to_string(), task_id.to_string())))
}

async fn save(state: &AppState, assignment: &TaskAssignment) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO task_assignments (trip_id, task_id, status, assigned_to, assigned_by,
                                      assigned_at, completed_by, completed_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(trip_id, task_id) DO UPDATE SET
            status = excluded.status,
            assigned_to = excluded.assigned_to,
            assigned_by = excluded.assigned_by,
            assigned_at = excluded.assigned_at,
            completed_by = excluded.completed_by,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&assignment.trip_id)
    .bind(&assignment.task_id)
    .bind(&assignment.status)
    .bind(&assignment.assigned_to)
    .bind(&assignment.assigned_by)
    .bind(&assignment.assigned_at)
    .bind(&assignment.completed_by)
    .bind(&assignment.completed_at)
    .bind(&assignment.created_at)
    .bind(&assignment.updated_at)
    .execute(&state.db)
    .await?;

    state.hub.publish(
        &assignment.trip_id,
        TripEvent::TaskUpdated {
            assignment: assignment.clone(),
        },
    );

    Ok(())
}

async fn assign_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((trip_id, task_id)): Path<(String, String)>,
    Json(req): Json<AssignRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_task_manager(&state, &trip_id, &user.email).await?;

    if !req.assigned_to.contains('@') {
        return Err(AppError::Validation("A valid assignee email is required".to_string()));
    }

    let mut assignment = load_or_new(&state, &trip_id, &task_id).await?;
    assignment.assign(req.assigned_to.trim().to_lowercase(), user.email);
    save(&state, &assignment).await?;

    Ok(Json(assignment))
}

async fn unassign_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((trip_id, task_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    require_task_manager(&state, &trip_id, &user.email).await?;

    let mut assignment = load_or_new(&state, &trip_id, &task_id).await?;
    assignment.unassign();
    save(&state, &assignment).await?;

    Ok(Json(assignment))
}

async fn complete_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((trip_id, task_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    require_task_manager(&state, &trip_id, &user.email).await?;

    let mut assignment = load_or_new(&state, &trip_id, &task_id).await?;
    assignment.complete(user.email);
    save(&state, &assignment).await?;

    Ok(Json(assignment))
}

async fn uncomplete_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((trip_id, task_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    require_task_manager(&state, &trip_id, &user.email).await?;

    let mut assignment = load_or_new(&state, &trip_id, &task_id).await?;
    assignment.uncomplete();
    save(&state, &assignment).await?;

    Ok(Json(assignment))
}

async fn list_comments(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((trip_id, task_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    policy::fetch_trip(&state.db, &trip_id).await?;
    policy::require_member(&state.db, &trip_id, &user.email).await?;

    let comments: Vec<TaskComment> = sqlx::query_as(
        "SELECT * FROM task_comments WHERE trip_id = ? AND task_id = ? ORDER BY created_at",
    )
    .bind(&trip_id)
    .bind(&task_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(comments))
}

/// Comments are open to every member, not just task managers: a viewer
/// asking "did anyone book this yet?" is the point of the thread.
async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((trip_id, task_id)): Path<(String, String)>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::fetch_trip(&state.db, &trip_id).await?;
    policy::require_member(&state.db, &trip_id, &user.email).await?;

    if req.content.trim().is_empty() {
        return Err(AppError::Validation("Comment content is required".to_string()));
    }

    let comment = TaskComment::new(
        trip_id.clone(),
        task_id,
        user.email,
        user.name,
        req.content.trim().to_string(),
    );

    sqlx::query(
        r#"
        INSERT INTO task_comments (id, trip_id, task_id, author_id, author_name, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&comment.id)
    .bind(&comment.trip_id)
    .bind(&comment.task_id)
    .bind(&comment.author_id)
    .bind(&comment.author_name)
    .bind(&comment.content)
    .bind(&comment.created_at)
    .execute(&state.db)
    .await?;

    state.hub.publish(
        &trip_id,
        TripEvent::CommentAdded {
            comment: comment.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Overlay the assignment ledger onto checklist items supplied by the
/// caller. The base items come from the (external) checklist generator and
/// are treated as read-only input.
async fn enhanced_readiness(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(trip_id): Path<String>,
    Json(req): Json<ReadinessRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::fetch_trip(&state.db, &trip_id).await?;
    policy::require_member(&state.db, &trip_id, &user.email).await?;

    let enhanced = overlay(&state, &trip_id, &req.items).await?;
    Ok(Json(enhanced))
}

async fn readiness_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(trip_id): Path<String>,
    Json(req): Json<ReadinessRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::fetch_trip(&state.db, &trip_id).await?;
    policy::require_member(&state.db, &trip_id, &user.email).await?;

    let enhanced = overlay(&state, &trip_id, &req.items).await?;
    Ok(Json(task_stats(&enhanced)))
}

async fn overlay(
    state: &AppState,
    trip_id: &str,
    items: &[ReadinessItem],
) -> Result<Vec<crate::models::EnhancedReadinessItem>, AppError> {
    let assignments: Vec<TaskAssignment> =
        sqlx::query_as("SELECT * FROM task_assignments WHERE trip_id = ?")
            .bind(trip_id)
            .fetch_all(&state.db)
            .await?;

    let comments: Vec<TaskComment> = sqlx::query_as(
        "SELECT * FROM task_comments WHERE trip_id = ? ORDER BY created_at",
    )
    .bind(trip_id)
    .fetch_all(&state.db)
    .await?;

    Ok(enhance_items(items, &assignments, &comments))
}
