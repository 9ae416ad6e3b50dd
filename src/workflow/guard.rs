//! The close guard. Pure and recomputed on every close attempt and every
//! permission edit; its result is never stored.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::types::{PermissionFlags, Role, UserView};
use crate::workflow::state::WorkflowState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseDecision {
    Allow,
    /// Admins left without any permission, reminder user first.
    Block { offenders: Vec<Uuid> },
    /// Nothing is blocking but drafts would be lost.
    PromptSave,
}

/// What an admin can do as the operator currently sees it: the draft when
/// one exists, otherwise the persisted value. The two are never merged.
pub fn effective_flags(user: &UserView, drafts: &BTreeMap<Uuid, PermissionFlags>) -> PermissionFlags {
    if user.is_seed {
        return PermissionFlags::ALL;
    }
    drafts
        .get(&user.id)
        .copied()
        .unwrap_or_else(|| user.permissions.effective())
}

pub fn evaluate_close(state: &WorkflowState, users: &[UserView]) -> CloseDecision {
    let mut offenders = Vec::new();

    if let Some(reminder) = &state.reminder {
        let flags = match users.iter().find(|u| u.id == reminder.user_id) {
            Some(user) => Some(effective_flags(user, &state.drafts)),
            None => state.drafts.get(&reminder.user_id).copied(),
        };
        if flags.is_some_and(|f| !f.any()) {
            offenders.push(reminder.user_id);
        }
    }

    for user in users.iter().filter(|u| u.role == Role::Admin && !u.is_seed) {
        if !effective_flags(user, &state.drafts).any() && !offenders.contains(&user.id) {
            offenders.push(user.id);
        }
    }

    if !offenders.is_empty() {
        CloseDecision::Block { offenders }
    } else if state.has_drafts() {
        CloseDecision::PromptSave
    } else {
        CloseDecision::Allow
    }
}

/// Message shown while the close is blocked.
pub fn blocked_message(offenders: &[Uuid], state: &WorkflowState, users: &[UserView]) -> String {
    let names: Vec<String> = offenders
        .iter()
        .map(|id| {
            users
                .iter()
                .find(|u| u.id == *id)
                .map(|u| u.name.clone())
                .or_else(|| {
                    state
                        .reminder
                        .as_ref()
                        .filter(|r| r.user_id == *id)
                        .map(|r| r.user_name.clone())
                })
                .unwrap_or_else(|| id.to_string())
        })
        .collect();

    format!(
        "Give {} at least one permission (add, edit or delete) before closing",
        names.join(", ")
    )
}
