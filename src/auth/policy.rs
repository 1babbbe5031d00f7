//! Single decision point for role and ownership checks.

use crate::error::AppError;
use crate::model::role::Role;

/// Who is acting: identity and role taken from a verified token.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Actor {
    pub user_id: u64,
    pub role: Role,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Action {
    ReadConversation,
    AppendToConversation,
    DeleteConversation,
    ReadUser,
    ListUsers,
    UpdateProfile,
    UpdateDepartment,
    UpdateRole,
    UpdateBalances,
    ListAllLeave,
    DecideLeave,
    WriteKnowledge,
    DeleteKnowledge,
    ViewOrganizationAnalytics,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Resource {
    /// Not tied to a single user.
    Organization,
    /// Belongs to the user with this id.
    OwnedBy(u64),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Permission {
    Allow,
    Deny,
}

impl Permission {
    pub fn is_allowed(self) -> bool {
        self == Permission::Allow
    }
}

pub fn authorize(actor: Actor, action: Action, resource: Resource) -> Permission {
    let owns = matches!(resource, Resource::OwnedBy(owner) if owner == actor.user_id);

    let allowed = match action {
        Action::ReadConversation | Action::AppendToConversation | Action::DeleteConversation => {
            owns
        }
        Action::ReadUser | Action::UpdateProfile => owns || actor.role.is_privileged(),
        Action::ListUsers
        | Action::UpdateDepartment
        | Action::UpdateBalances
        | Action::ListAllLeave
        | Action::DecideLeave
        | Action::WriteKnowledge
        | Action::ViewOrganizationAnalytics => actor.role.is_privileged(),
        Action::UpdateRole | Action::DeleteKnowledge => actor.role == Role::Admin,
    };

    if allowed {
        Permission::Allow
    } else {
        Permission::Deny
    }
}

/// `authorize`, with a denial turned into `AccessDenied`.
pub fn require(actor: Actor, action: Action, resource: Resource) -> Result<(), AppError> {
    if authorize(actor, action, resource).is_allowed() {
        return Ok(());
    }

    let message = match action {
        Action::ReadConversation | Action::AppendToConversation | Action::DeleteConversation => {
            "Access denied to this conversation"
        }
        Action::ReadUser | Action::UpdateProfile => "You can only access your own profile",
        Action::UpdateRole | Action::DeleteKnowledge => "Admin only",
        _ => "HR/Admin only",
    };
    Err(AppError::AccessDenied(message.into()))
}
