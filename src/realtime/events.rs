//! Typed events fanned out to every live subscriber of a trip.

use serde::Serialize;

use crate::models::{PresenceData, TaskAssignment, TaskComment, Trip, TripCollaborator};

/// Message sent from server to subscribed clients.
///
/// `snapshot` is only sent point-to-point right after a client connects;
/// everything else is broadcast to the whole trip channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TripEvent {
    /// Initial state dump after connection
    Snapshot {
        trip: Box<Trip>,
        members: Vec<PresenceData>,
        typing: Vec<String>,
    },
    /// The trip document changed; carries the full authoritative document
    TripUpdated { trip: Box<Trip> },
    /// An invite was accepted
    MemberJoined { collaborator: TripCollaborator },
    /// The owner removed a collaborator
    MemberRemoved { trip_id: String, user_id: String },
    /// Assignment/completion state of a checklist task changed
    TaskUpdated { assignment: TaskAssignment },
    /// A comment was appended to a task
    CommentAdded { comment: TaskComment },
    /// The presence list for the trip changed
    PresenceChanged {
        trip_id: String,
        members: Vec<PresenceData>,
    },
    /// The set of currently-typing users changed
    TypingChanged {
        trip_id: String,
        user_ids: Vec<String>,
    },
}
