pub mod collaborator;
pub mod invite;
pub mod presence;
pub mod task;
pub mod trip;
pub mod user;

pub use collaborator::{
    CollaboratorView, Role, TripCollaborator, TripPermissions, permissions_for_role,
};
pub use invite::{InviteError, InviteStatus, TripInvite};
pub use presence::{PresenceData, PresenceStatus, PresenceUpdate};
pub use task::{
    EnhancedReadinessItem, MemberTaskStats, ReadinessItem, TaskAssignment, TaskComment, TaskStats,
    TaskStatus, enhance_items, task_stats,
};
pub use trip::{NewTrip, Trip, TripRow, TripUpdate};
pub use user::User;
