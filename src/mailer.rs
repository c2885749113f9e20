//! Outbound invite notifications. Delivery is fire-and-forget: the invite
//! row is already persisted and stays valid whether or not the email lands,
//! so senders spawn the delivery and move on.

use async_trait::async_trait;

use crate::models::TripInvite;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver the invitation email carrying the acceptance deep link.
    async fn send_invite(&self, invite: &TripInvite, trip_title: &str) -> Result<(), String>;
}

/// Development mailer: writes the invite to the log instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_invite(&self, invite: &TripInvite, trip_title: &str) -> Result<(), String> {
        tracing::info!(
            to = %invite.invitee_email,
            from = %invite.inviter_name,
            trip = %trip_title,
            token = %invite.token,
            "Invite email (log only)"
        );
        Ok(())
    }
}
