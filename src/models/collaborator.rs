use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum Role {
    #[serde(rename = "owner")]
    #[sqlx(rename = "owner")]
    Owner,
    #[serde(rename = "collaborator")]
    #[sqlx(rename = "collaborator")]
    Collaborator,
    #[serde(rename = "viewer")]
    #[sqlx(rename = "viewer")]
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Collaborator => write!(f, "collaborator"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

/// Capability set for a trip member. Never stored; always derived from the
/// member's role via [`permissions_for_role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPermissions {
    pub can_edit: bool,
    pub can_invite: bool,
    pub can_delete: bool,
    pub can_manage_tasks: bool,
    pub can_book_activities: bool,
    pub can_view_budget: bool,
    pub can_manage_family: bool,
}

/// Static role → capability mapping. Pure: same role in, same booleans out.
pub fn permissions_for_role(role: Role) -> TripPermissions {
    match role {
        Role::Owner => TripPermissions {
            can_edit: true,
            can_invite: true,
            can_delete: true,
            can_manage_tasks: true,
            can_book_activities: true,
            can_view_budget: true,
            can_manage_family: true,
        },
        Role::Collaborator => TripPermissions {
            can_edit: true,
            can_invite: false,
            can_delete: false,
            can_manage_tasks: true,
            can_book_activities: true,
            can_view_budget: true,
            can_manage_family: false,
        },
        Role::Viewer => TripPermissions {
            can_edit: false,
            can_invite: false,
            can_delete: false,
            can_manage_tasks: false,
            can_book_activities: false,
            can_view_budget: true,
            can_manage_family: false,
        },
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TripCollaborator {
    pub trip_id: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub joined_at: String,
    pub last_active: String,
}

impl TripCollaborator {
    pub fn new(trip_id: String, email: String, name: String, role: Role) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            trip_id,
            user_id: email.clone(),
            email,
            name,
            role,
            joined_at: now.clone(),
            last_active: now,
        }
    }

    pub fn permissions(&self) -> TripPermissions {
        permissions_for_role(self.role)
    }
}

/// Collaborator together with the permissions the SPA renders against.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorView {
    #[serde(flatten)]
    pub collaborator: TripCollaborator,
    pub permissions: TripPermissions,
}

impl From<TripCollaborator> for CollaboratorView {
    fn from(collaborator: TripCollaborator) -> Self {
        let permissions = collaborator.permissions();
        Self {
            collaborator,
            permissions,
        }
    }
}
