use serde::Serialize;
use uuid::Uuid;

use crate::policy;
use crate::types::{PermissionFlags, Role, UserView};
use crate::workflow::guard::effective_flags;
use crate::workflow::reducer::Context;
use crate::workflow::state::{HighlightTone, WorkflowState};

/// One line of the access-management table, as the viewer should see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_seed: bool,
    pub is_self: bool,
    pub role_selector_enabled: bool,
    pub permissions_editable: bool,
    /// Draft if any, else persisted; the seed always shows every flag.
    pub flags: PermissionFlags,
    pub dirty: bool,
    pub new_admin: bool,
    pub highlight: Option<HighlightTone>,
}

pub fn roster(state: &WorkflowState, ctx: &Context<'_>) -> Vec<RosterRow> {
    ctx.users.iter().map(|user| row(state, ctx.viewer, user)).collect()
}

fn row(state: &WorkflowState, viewer: &UserView, user: &UserView) -> RosterRow {
    RosterRow {
        user_id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        is_seed: user.is_seed,
        is_self: user.id == viewer.id,
        role_selector_enabled: policy::authorize_role_change(viewer, user).is_ok(),
        permissions_editable: policy::permissions_editable(viewer, user),
        flags: effective_flags(user, &state.drafts),
        dirty: state.drafts.contains_key(&user.id),
        new_admin: state.reminder.as_ref().is_some_and(|r| r.user_id == user.id),
        highlight: state.is_highlighted(user.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Permissions;
    use chrono::Utc;

    fn user(name: &str, role: Role, permissions: Permissions, is_seed: bool) -> UserView {
        UserView {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name.to_lowercase()),
            name: name.to_string(),
            role,
            permissions,
            is_seed,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn non_seed_admin_sees_everything_disabled() {
        let seed = user("Seed", Role::Admin, Permissions::FullAccess, true);
        let admin = user("Ann", Role::Admin, Permissions::Granted(PermissionFlags::new(true, false, false)), false);
        let member = user("Max", Role::User, Permissions::FullAccess, false);
        let users = vec![seed, admin.clone(), member];

        let rows = roster(&WorkflowState::new(), &Context::new(&admin, &users));
        let own = rows.iter().find(|r| r.is_self).unwrap();
        assert!(!own.role_selector_enabled);
        assert!(rows.iter().all(|r| !r.role_selector_enabled && !r.permissions_editable));
    }

    #[test]
    fn seed_sees_others_enabled_but_not_itself() {
        let seed = user("Seed", Role::Admin, Permissions::Granted(PermissionFlags::NONE), true);
        let admin = user("Ann", Role::Admin, Permissions::FullAccess, false);
        let member = user("Max", Role::User, Permissions::FullAccess, false);
        let users = vec![seed.clone(), admin, member];

        let rows = roster(&WorkflowState::new(), &Context::new(&seed, &users));
        assert!(!rows[0].role_selector_enabled);
        assert!(!rows[0].permissions_editable);
        assert_eq!(rows[0].flags, PermissionFlags::ALL);

        assert!(rows[1].role_selector_enabled && rows[1].permissions_editable);
        assert_eq!(rows[1].flags, PermissionFlags::ALL);
        assert!(rows[2].role_selector_enabled && !rows[2].permissions_editable);
    }

    #[test]
    fn drafts_mark_rows_dirty() {
        let seed = user("Seed", Role::Admin, Permissions::FullAccess, true);
        let admin = user("Ann", Role::Admin, Permissions::FullAccess, false);
        let users = vec![seed.clone(), admin.clone()];
        let mut state = WorkflowState::new();
        state.drafts.insert(admin.id, PermissionFlags::new(false, false, true));

        let rows = roster(&state, &Context::new(&seed, &users));
        assert!(rows[1].dirty);
        assert_eq!(rows[1].flags, PermissionFlags::new(false, false, true));
    }
}
