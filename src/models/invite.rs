use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Role;

/// Invites stay valid for a week after they are sent.
pub const INVITE_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum InviteStatus {
    #[serde(rename = "pending")]
    #[sqlx(rename = "pending")]
    Pending,
    #[serde(rename = "accepted")]
    #[sqlx(rename = "accepted")]
    Accepted,
    #[serde(rename = "declined")]
    #[sqlx(rename = "declined")]
    Declined,
    #[serde(rename = "expired")]
    #[sqlx(rename = "expired")]
    Expired,
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InviteStatus::Pending => write!(f, "pending"),
            InviteStatus::Accepted => write!(f, "accepted"),
            InviteStatus::Declined => write!(f, "declined"),
            InviteStatus::Expired => write!(f, "expired"),
        }
    }
}

/// The distinct, user-facing ways resolving an invite can fail. The SPA
/// renders a dedicated screen per variant, so these must stay separate
/// rather than collapsing into one generic error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteError {
    InvalidToken,
    AlreadyProcessed(InviteStatus),
    Expired,
    EmailMismatch,
}

impl std::fmt::Display for InviteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InviteError::InvalidToken => write!(f, "This invitation link is not valid"),
            InviteError::AlreadyProcessed(status) => {
                write!(f, "This invitation has already been {status}")
            }
            InviteError::Expired => write!(f, "This invitation has expired"),
            InviteError::EmailMismatch => {
                write!(f, "This invitation was sent to a different email address")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TripInvite {
    pub id: String,
    pub trip_id: String,
    pub inviter_id: String,
    pub inviter_name: String,
    pub invitee_email: String,
    pub role: Role,
    pub token: String,
    pub status: InviteStatus,
    pub message: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}

impl TripInvite {
    pub fn new(
        trip_id: String,
        inviter_id: String,
        inviter_name: String,
        invitee_email: String,
        role: Role,
        message: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            trip_id,
            inviter_id,
            inviter_name,
            invitee_email: invitee_email.trim().to_lowercase(),
            role,
            token: Uuid::new_v4().to_string(),
            status: InviteStatus::Pending,
            message,
            created_at: now.to_rfc3339(),
            expires_at: (now + Duration::days(INVITE_TTL_DAYS)).to_rfc3339(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let expires: DateTime<Utc> = self
            .expires_at
            .parse()
            .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC);
        now > expires
    }

    /// State-machine gate shared by accept and decline: the invite must still
    /// be pending and unexpired. Expiry is checked lazily here so a stale
    /// `pending` row fails correctly even if no sweeper ever ran.
    pub fn ensure_pending(&self, now: DateTime<Utc>) -> Result<(), InviteError> {
        match self.status {
            InviteStatus::Pending => {}
            InviteStatus::Expired => return Err(InviteError::Expired),
            status => return Err(InviteError::AlreadyProcessed(status)),
        }
        if self.is_expired_at(now) {
            return Err(InviteError::Expired);
        }
        Ok(())
    }

    /// Full acceptance gate: pending, unexpired, and addressed to the
    /// accepting user.
    pub fn ensure_acceptable_by(
        &self,
        accepting_email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), InviteError> {
        self.ensure_pending(now)?;
        if !self
            .invitee_email
            .eq_ignore_ascii_case(accepting_email.trim())
        {
            return Err(InviteError::EmailMismatch);
        }
        Ok(())
    }
}
