//! Authorization policy shared by the API and the access workflow.
//!
//! Decisions are made over [`UserView`], which already carries the derived
//! `is_seed` flag, so the same rules run server-side (enforcement) and
//! client-side (disabling controls).

use thiserror::Error;

use crate::types::{Action, Permissions, Resource, Role, UserView};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Admin access required")]
    AdminRequired,

    #[error("You do not have permission to {action} {resource}")]
    PermissionDenied { resource: Resource, action: Action },

    #[error("Only the seed admin can manage roles and permissions")]
    SeedRequired,

    #[error("The seed admin cannot be modified")]
    SeedImmutable,

    #[error("You cannot change your own role")]
    SelfModification,
}

pub fn require_admin(user: &UserView) -> Result<(), PolicyError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(PolicyError::AdminRequired)
    }
}

/// Decide an admin-scoped catalog action.
pub fn authorize(user: &UserView, resource: Resource, action: Action) -> Result<(), PolicyError> {
    if user.is_seed {
        return Ok(());
    }
    require_admin(user)?;

    match user.permissions {
        Permissions::FullAccess => Ok(()),
        Permissions::Granted(flags) if flags.get(action) => Ok(()),
        Permissions::Granted(_) => Err(PolicyError::PermissionDenied { resource, action }),
    }
}

pub fn can(user: &UserView, resource: Resource, action: Action) -> bool {
    authorize(user, resource, action).is_ok()
}

/// Promote/demote: seed only, never on self, never on the seed.
pub fn authorize_role_change(actor: &UserView, target: &UserView) -> Result<(), PolicyError> {
    if !actor.is_seed {
        return Err(PolicyError::SeedRequired);
    }
    if actor.id == target.id {
        return Err(PolicyError::SelfModification);
    }
    if target.is_seed {
        return Err(PolicyError::SeedImmutable);
    }
    Ok(())
}

/// Permission edits: seed only, never on the seed (itself included).
pub fn authorize_permission_edit(actor: &UserView, target: &UserView) -> Result<(), PolicyError> {
    if !actor.is_seed {
        return Err(PolicyError::SeedRequired);
    }
    if target.is_seed {
        return Err(PolicyError::SeedImmutable);
    }
    Ok(())
}

/// Whether a row's permission checkboxes are live for this viewer.
pub fn permissions_editable(actor: &UserView, target: &UserView) -> bool {
    target.role == Role::Admin && authorize_permission_edit(actor, target).is_ok()
}
