mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{TestApp, assert_error, body_json};
use serde_json::json;

// --- Creation ---

#[tokio::test]
async fn owner_can_invite() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;

    let resp = app
        .post_json(
            &format!("/trips/{trip_id}/invites"),
            &json!({ "email": "Dad@Example.com", "role": "collaborator", "message": "join us!" }),
            Some(&mom),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let invite = body_json(resp).await;
    assert_eq!(invite["status"], "pending");
    assert_eq!(invite["inviteeEmail"], "dad@example.com");
    assert_eq!(invite["inviterName"], "Mom");
    assert!(!invite["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn collaborator_cannot_invite() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;
    let token = app.invite(&mom, &trip_id, "dad@example.com", "collaborator").await;

    let dad = app.login("dad@example.com", "Dad").await;
    app.post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&dad))
        .await;

    // Collaborators can edit but not grow the family circle.
    let resp = app
        .post_json(
            &format!("/trips/{trip_id}/invites"),
            &json!({ "email": "uncle@example.com", "role": "viewer" }),
            Some(&dad),
        )
        .await;
    assert_error(resp, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
async fn owner_role_is_never_issuable() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;

    let resp = app
        .post_json(
            &format!("/trips/{trip_id}/invites"),
            &json!({ "email": "dad@example.com", "role": "owner" }),
            Some(&mom),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- The deep link ---

#[tokio::test]
async fn invite_preview_needs_no_session() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;
    let token = app.invite(&mom, &trip_id, "dad@example.com", "viewer").await;

    let resp = app.get(&format!("/invites/{token}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let preview = body_json(resp).await;
    assert_eq!(preview["tripTitle"], "Summer trip");
    assert_eq!(preview["invite"]["status"], "pending");
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let app = TestApp::new().await;
    let resp = app.get("/invites/not-a-token", None).await;
    assert_error(resp, StatusCode::NOT_FOUND).await;
}

// --- Acceptance ---

#[tokio::test]
async fn accept_adds_collaborator_with_invited_role() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;
    let token = app.invite(&mom, &trip_id, "kid@example.com", "viewer").await;

    let kid = app.login("kid@example.com", "Kid").await;
    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&kid))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let detail = body_json(resp).await;
    let collaborators = detail["collaborators"].as_array().unwrap();
    assert_eq!(collaborators.len(), 2);

    let kid_entry = collaborators
        .iter()
        .find(|c| c["userId"] == "kid@example.com")
        .unwrap();
    assert_eq!(kid_entry["role"], "viewer");
    assert_eq!(kid_entry["permissions"]["canEdit"], false);
    assert_eq!(kid_entry["permissions"]["canViewBudget"], true);

    // Accepting a member bumps the shared document version.
    assert_eq!(detail["trip"]["version"], 2);
    assert_eq!(detail["trip"]["modifiedBy"], "kid@example.com");
}

#[tokio::test]
async fn accept_with_wrong_email_is_rejected() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;
    let token = app.invite(&mom, &trip_id, "a@x.com", "viewer").await;

    let other = app.login("b@x.com", "B").await;
    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&other))
        .await;
    let msg = assert_error(resp, StatusCode::FORBIDDEN).await;
    assert!(msg.contains("different email"));

    // The invite is still pending for its real addressee.
    let a = app.login("a@x.com", "A").await;
    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&a))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn invites_are_single_use() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;
    let token = app.invite(&mom, &trip_id, "dad@example.com", "collaborator").await;

    let dad = app.login("dad@example.com", "Dad").await;
    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&dad))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Second accept fails with a state conflict, not a generic error.
    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&dad))
        .await;
    let msg = assert_error(resp, StatusCode::CONFLICT).await;
    assert!(msg.contains("already been accepted"));

    // And so does a late decline.
    let resp = app
        .post_json(&format!("/invites/{token}/decline"), &json!({}), None)
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn declined_invite_cannot_be_accepted() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;
    let token = app.invite(&mom, &trip_id, "dad@example.com", "collaborator").await;

    let resp = app
        .post_json(&format!("/invites/{token}/decline"), &json!({}), None)
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Declining resolves the invite without touching the trip.
    let (version,): (i64,) = sqlx::query_as("SELECT version FROM trips WHERE id = ?")
        .bind(&trip_id)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(version, 1);

    let dad = app.login("dad@example.com", "Dad").await;
    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&dad))
        .await;
    let msg = assert_error(resp, StatusCode::CONFLICT).await;
    assert!(msg.contains("already been declined"));
}

#[tokio::test]
async fn stale_pending_invite_expires_on_accept() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;
    let token = app.invite(&mom, &trip_id, "dad@example.com", "collaborator").await;

    // Backdate the deadline while the row still says pending.
    let yesterday = (Utc::now() - Duration::days(1)).to_rfc3339();
    sqlx::query("UPDATE trip_invites SET expires_at = ? WHERE token = ?")
        .bind(&yesterday)
        .bind(&token)
        .execute(&app.db)
        .await
        .unwrap();

    let dad = app.login("dad@example.com", "Dad").await;
    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&dad))
        .await;
    assert_error(resp, StatusCode::GONE).await;

    // The lazy check also moved the stored status to its terminal state.
    let (status,): (String,) = sqlx::query_as("SELECT status FROM trip_invites WHERE token = ?")
        .bind(&token)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(status, "expired");
}

#[tokio::test]
async fn accept_requires_session() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;
    let token = app.invite(&mom, &trip_id, "dad@example.com", "viewer").await;

    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), None)
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_accept_sequence_creates_a_second_owner() {
    let app = TestApp::new().await;
    let mom = app.login("mom@example.com", "Mom").await;
    let trip_id = app.create_trip(&mom, "Summer trip").await;

    // Even the owner re-entering through an invite keeps exactly one owner.
    let token = app.invite(&mom, &trip_id, "mom@example.com", "collaborator").await;
    let resp = app
        .post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&mom))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let token = app.invite(&mom, &trip_id, "dad@example.com", "collaborator").await;
    let dad = app.login("dad@example.com", "Dad").await;
    app.post_json(&format!("/invites/{token}/accept"), &json!({}), Some(&dad))
        .await;

    let owners: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM trip_collaborators WHERE trip_id = ? AND role = 'owner'",
    )
    .bind(&trip_id)
    .fetch_one(&app.db)
    .await
    .unwrap();
    assert_eq!(owners.0, 1);

    let (mom_role,): (String,) = sqlx::query_as(
        "SELECT role FROM trip_collaborators WHERE trip_id = ? AND user_id = ?",
    )
    .bind(&trip_id)
    .bind("mom@example.com")
    .fetch_one(&app.db)
    .await
    .unwrap();
    assert_eq!(mom_role, "owner");
}
