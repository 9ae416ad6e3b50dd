use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy;
use crate::types::{Action, PermissionFlags, Role, UserView};
use crate::workflow::guard::{blocked_message, effective_flags, evaluate_close, CloseDecision};
use crate::workflow::state::{HighlightTone, NewAdminReminder, PendingChange, Phase, WorkflowState};

/// How long a row highlight stays before it fades on its own.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(3);

/// Read-only inputs of a reduction: who is operating and the latest user list.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub viewer: &'a UserView,
    pub users: &'a [UserView],
}

impl<'a> Context<'a> {
    pub fn new(viewer: &'a UserView, users: &'a [UserView]) -> Self {
        Self { viewer, users }
    }

    pub fn user(&self, user_id: Uuid) -> Option<&'a UserView> {
        self.users.iter().find(|u| u.id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    RequestRoleChange { user_id: Uuid, new_role: Role },
    ConfirmRoleChange,
    CancelRoleChange,
    /// The server accepted a promote/demote; carries the updated account.
    RoleChangeApplied { user: UserView },
    RoleChangeFailed { user_id: Uuid, message: String },
    TogglePermission { user_id: Uuid, action: Action, value: bool },
    SavePermissions { user_id: Uuid },
    PermissionsSaved { user: UserView },
    PermissionsSaveFailed { user_id: Uuid, message: String },
    RequestClose,
    SaveAllAndClose,
    CancelClose,
    DiscardDrafts,
    HighlightExpired { highlight_id: u64 },
    DismissError,
    /// The user list could not be reloaded.
    RefreshFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Promote { user_id: Uuid },
    Demote { user_id: Uuid },
    SavePermissions { user_id: Uuid, permissions: PermissionFlags },
    /// Saved one by one in order; the first failure stops the sequence.
    SaveAll { drafts: Vec<(Uuid, PermissionFlags)> },
    Refetch,
    ScrollIntoView { user_id: Uuid },
    ClearHighlightAfter { highlight_id: u64, after: Duration },
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: WorkflowState,
    pub commands: Vec<Command>,
}

pub fn reduce(state: &WorkflowState, ctx: &Context<'_>, event: Event) -> Transition {
    let mut next = state.clone();
    let mut commands = Vec::new();

    if next.phase == Phase::Closed || blocked_by_prompt(next.phase, &event) {
        return Transition { state: next, commands };
    }

    match event {
        Event::RequestRoleChange { user_id, new_role } => {
            request_role_change(&mut next, ctx, user_id, new_role);
        }
        Event::ConfirmRoleChange => {
            if let Some(pending) = next.pending_change.take() {
                commands.push(match pending.new_role {
                    Role::Admin => Command::Promote { user_id: pending.user_id },
                    Role::User => Command::Demote { user_id: pending.user_id },
                });
            }
            next.phase = next.settled_phase();
        }
        Event::CancelRoleChange => {
            next.pending_change = None;
            next.phase = next.settled_phase();
        }
        Event::RoleChangeApplied { user } => {
            match user.role {
                Role::Admin => {
                    // A fresh admin starts with nothing, whatever they had before.
                    next.drafts.insert(user.id, PermissionFlags::NONE);
                    next.reminder = Some(NewAdminReminder {
                        user_id: user.id,
                        user_name: user.name.clone(),
                    });
                    let highlight_id = next.set_highlight(HighlightTone::Info, vec![user.id]);
                    commands.push(Command::ScrollIntoView { user_id: user.id });
                    commands.push(Command::ClearHighlightAfter {
                        highlight_id,
                        after: HIGHLIGHT_DURATION,
                    });
                }
                Role::User => next.forget_user(user.id),
            }
            recheck_block(&mut next, ctx);
            next.phase = next.settled_phase();
        }
        Event::RoleChangeFailed { message, .. } => {
            next.error = Some(message);
            commands.push(Command::Refetch);
            next.phase = next.settled_phase();
        }
        Event::TogglePermission { user_id, action, value } => {
            toggle_permission(&mut next, ctx, user_id, action, value);
        }
        Event::SavePermissions { user_id } => {
            if let Some(permissions) = next.drafts.get(&user_id).copied() {
                commands.push(Command::SavePermissions { user_id, permissions });
            }
        }
        Event::PermissionsSaved { user } => {
            next.drafts.remove(&user.id);
            if next.reminder.as_ref().is_some_and(|r| r.user_id == user.id) {
                next.reminder = None;
            }
            if next.closing_after_save && next.drafts.is_empty() {
                next.closing_after_save = false;
                attempt_close(&mut next, ctx, &mut commands);
            } else {
                recheck_block(&mut next, ctx);
                if !next.closing_after_save {
                    next.phase = next.settled_phase();
                }
            }
        }
        Event::PermissionsSaveFailed { message, .. } => {
            next.closing_after_save = false;
            next.error = Some(message);
            commands.push(Command::Refetch);
            next.phase = next.settled_phase();
        }
        Event::RequestClose => {
            next.pending_change = None;
            attempt_close(&mut next, ctx, &mut commands);
        }
        Event::SaveAllAndClose => {
            next.pending_change = None;
            match evaluate_close(&next, ctx.users) {
                CloseDecision::PromptSave => {
                    next.closing_after_save = true;
                    next.phase = Phase::EditingPermissions;
                    commands.push(Command::SaveAll {
                        drafts: ordered_drafts(&next, ctx),
                    });
                }
                _ => attempt_close(&mut next, ctx, &mut commands),
            }
        }
        Event::CancelClose => {
            next.phase = next.settled_phase();
        }
        Event::DiscardDrafts => {
            next.drafts.clear();
            next.pending_change = None;
            attempt_close(&mut next, ctx, &mut commands);
        }
        Event::HighlightExpired { highlight_id } => {
            if next.highlight.as_ref().is_some_and(|h| h.id == highlight_id) {
                next.highlight = None;
            }
        }
        Event::DismissError => {
            next.error = None;
            next.blocked_by.clear();
            next.phase = next.settled_phase();
        }
        Event::RefreshFailed { message } => {
            next.error = Some(message);
        }
    }

    Transition { state: next, commands }
}

/// The discard-or-save prompt is modal: only its own answers and the
/// outcomes of work already in flight get through.
fn blocked_by_prompt(phase: Phase, event: &Event) -> bool {
    phase == Phase::ConfirmDiscardOrSave
        && matches!(
            event,
            Event::RequestRoleChange { .. }
                | Event::ConfirmRoleChange
                | Event::TogglePermission { .. }
                | Event::SavePermissions { .. }
                | Event::RequestClose
        )
}

fn request_role_change(next: &mut WorkflowState, ctx: &Context<'_>, user_id: Uuid, new_role: Role) {
    let Some(target) = ctx.user(user_id) else {
        next.error = Some(format!("User {} not found", user_id));
        return;
    };
    if let Err(e) = policy::authorize_role_change(ctx.viewer, target) {
        next.error = Some(e.to_string());
        return;
    }
    if target.role == new_role {
        return;
    }

    // Only one change can be pending; a new request replaces the old one.
    next.pending_change = Some(PendingChange {
        user_id,
        new_role,
        user_name: target.name.clone(),
    });
    next.phase = Phase::AwaitingRoleConfirmation;
}

fn toggle_permission(
    next: &mut WorkflowState,
    ctx: &Context<'_>,
    user_id: Uuid,
    action: Action,
    value: bool,
) {
    let Some(target) = ctx.user(user_id) else {
        next.error = Some(format!("User {} not found", user_id));
        return;
    };
    if !policy::permissions_editable(ctx.viewer, target) {
        next.error = Some(format!("Permissions of {} cannot be edited", target.name));
        return;
    }

    let flags = effective_flags(target, &next.drafts).with(action, value);
    next.drafts.insert(user_id, flags);
    recheck_block(next, ctx);
    next.phase = next.settled_phase();
}

fn attempt_close(next: &mut WorkflowState, ctx: &Context<'_>, commands: &mut Vec<Command>) {
    match evaluate_close(next, ctx.users) {
        CloseDecision::Block { offenders } => {
            next.error = Some(blocked_message(&offenders, next, ctx.users));
            next.blocked_by = offenders.clone();
            let highlight_id = next.set_highlight(HighlightTone::Error, offenders.clone());
            if let Some(first) = offenders.first() {
                commands.push(Command::ScrollIntoView { user_id: *first });
            }
            commands.push(Command::ClearHighlightAfter {
                highlight_id,
                after: HIGHLIGHT_DURATION,
            });
            next.phase = Phase::BlockedClose;
        }
        CloseDecision::PromptSave => {
            next.phase = Phase::ConfirmDiscardOrSave;
        }
        CloseDecision::Allow => {
            next.error = None;
            next.blocked_by.clear();
            next.highlight = None;
            next.phase = Phase::Closed;
            commands.push(Command::Close);
        }
    }
}

/// Keeps the blocked-close message in step with the data until it resolves.
fn recheck_block(next: &mut WorkflowState, ctx: &Context<'_>) {
    if next.blocked_by.is_empty() {
        return;
    }
    match evaluate_close(next, ctx.users) {
        CloseDecision::Block { offenders } => {
            next.error = Some(blocked_message(&offenders, next, ctx.users));
            next.blocked_by = offenders;
        }
        _ => {
            next.error = None;
            next.blocked_by.clear();
        }
    }
}

/// Drafts in list order, so a failed save-all stops at a predictable row.
fn ordered_drafts(state: &WorkflowState, ctx: &Context<'_>) -> Vec<(Uuid, PermissionFlags)> {
    let mut ordered: Vec<(Uuid, PermissionFlags)> = ctx
        .users
        .iter()
        .filter_map(|u| state.drafts.get(&u.id).map(|flags| (u.id, *flags)))
        .collect();
    for (id, flags) in &state.drafts {
        if !ordered.iter().any(|(seen, _)| seen == id) {
            ordered.push((*id, *flags));
        }
    }
    ordered
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

    struct World {
        seed: UserView,
        users: Vec<UserView>,
        state: WorkflowState,
    }

    impl World {
        fn new(others: Vec<UserView>) -> Self {
            let seed = user("Seed", Role::Admin, Permissions::FullAccess, true);
            let mut users = vec![seed.clone()];
            users.extend(others);
            Self {
                seed,
                users,
                state: WorkflowState::new(),
            }
        }

        fn send(&mut self, event: Event) -> Vec<Command> {
            let ctx = Context::new(&self.seed, &self.users);
            let t = reduce(&self.state, &ctx, event);
            self.state = t.state;
            t.commands
        }

        /// Stands in for the server plus a directory refresh.
        fn replace(&mut self, updated: UserView) {
            if let Some(slot) = self.users.iter_mut().find(|u| u.id == updated.id) {
                *slot = updated;
            }
        }

        fn promote(&mut self, id: Uuid) -> UserView {
            let mut u = self.users.iter().find(|u| u.id == id).cloned().unwrap();
            u.role = Role::Admin;
            u.permissions = Permissions::Granted(PermissionFlags::NONE);
            self.replace(u.clone());
            u
        }
    }

    #[test]
    fn request_then_confirm_emits_promote() {
        let member = user("Member", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![member.clone()]);

        assert!(w
            .send(Event::RequestRoleChange { user_id: member.id, new_role: Role::Admin })
            .is_empty());
        assert_eq!(w.state.phase, Phase::AwaitingRoleConfirmation);
        assert_eq!(w.state.pending_change.as_ref().unwrap().user_name, "Member");

        let commands = w.send(Event::ConfirmRoleChange);
        assert_eq!(commands, vec![Command::Promote { user_id: member.id }]);
        assert!(w.state.pending_change.is_none());
        assert_eq!(w.state.phase, Phase::Idle);
    }

    #[test]
    fn new_request_replaces_pending_one() {
        let a = user("A", Role::User, Permissions::FullAccess, false);
        let b = user("B", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![a.clone(), b.clone()]);

        w.send(Event::RequestRoleChange { user_id: a.id, new_role: Role::Admin });
        w.send(Event::RequestRoleChange { user_id: b.id, new_role: Role::Admin });
        assert_eq!(w.state.pending_change.as_ref().unwrap().user_id, b.id);

        w.send(Event::CancelRoleChange);
        assert!(w.state.pending_change.is_none());
        assert_eq!(w.state.phase, Phase::Idle);
    }

    #[test]
    fn seed_row_and_self_cannot_be_requested() {
        let mut w = World::new(vec![]);
        let seed_id = w.seed.id;
        w.send(Event::RequestRoleChange { user_id: seed_id, new_role: Role::User });
        assert!(w.state.pending_change.is_none());
        assert!(w.state.error.is_some());
    }

    #[test]
    fn promotion_seeds_all_false_draft_and_reminder() {
        let member = user("Member", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![member.clone()]);
        let promoted = w.promote(member.id);

        let commands = w.send(Event::RoleChangeApplied { user: promoted });
        assert_eq!(w.state.drafts.get(&member.id), Some(&PermissionFlags::NONE));
        assert_eq!(w.state.reminder.as_ref().unwrap().user_id, member.id);
        assert_eq!(w.state.is_highlighted(member.id), Some(HighlightTone::Info));
        assert_eq!(w.state.phase, Phase::EditingPermissions);
        assert!(commands.contains(&Command::ScrollIntoView { user_id: member.id }));
    }

    #[test]
    fn re_promotion_does_not_inherit_old_flags() {
        let member = user("Member", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![member.clone()]);
        w.state.drafts.insert(member.id, PermissionFlags::ALL);

        let promoted = w.promote(member.id);
        w.send(Event::RoleChangeApplied { user: promoted });
        assert_eq!(w.state.drafts.get(&member.id), Some(&PermissionFlags::NONE));
    }

    #[test]
    fn demotion_drops_draft_reminder_and_highlight() {
        let member = user("Member", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![member.clone()]);
        let promoted = w.promote(member.id);
        w.send(Event::RoleChangeApplied { user: promoted.clone() });

        let mut demoted = promoted;
        demoted.role = Role::User;
        demoted.permissions = Permissions::FullAccess;
        w.replace(demoted.clone());
        w.send(Event::RoleChangeApplied { user: demoted });

        assert!(w.state.drafts.is_empty());
        assert!(w.state.reminder.is_none());
        assert!(w.state.highlight.is_none());
        assert_eq!(w.state.phase, Phase::Idle);
    }

    #[test]
    fn toggle_keeps_other_flags() {
        let admin = user("Ann", Role::Admin, Permissions::Granted(PermissionFlags::new(true, true, false)), false);
        let mut w = World::new(vec![admin.clone()]);

        w.send(Event::TogglePermission { user_id: admin.id, action: Action::Delete, value: true });
        assert_eq!(w.state.drafts.get(&admin.id), Some(&PermissionFlags::ALL));
        w.send(Event::TogglePermission { user_id: admin.id, action: Action::Add, value: false });
        assert_eq!(
            w.state.drafts.get(&admin.id),
            Some(&PermissionFlags::new(false, true, true))
        );
    }

    #[test]
    fn toggling_full_access_admin_starts_from_all_true() {
        let legacy = user("Legacy", Role::Admin, Permissions::FullAccess, false);
        let mut w = World::new(vec![legacy.clone()]);
        w.send(Event::TogglePermission { user_id: legacy.id, action: Action::Edit, value: false });
        assert_eq!(
            w.state.drafts.get(&legacy.id),
            Some(&PermissionFlags::new(true, false, true))
        );
    }

    #[test]
    fn seed_permissions_are_not_editable() {
        let mut w = World::new(vec![]);
        let seed_id = w.seed.id;
        w.send(Event::TogglePermission { user_id: seed_id, action: Action::Add, value: false });
        assert!(w.state.drafts.is_empty());
        assert!(w.state.error.is_some());
    }

    #[test]
    fn close_with_all_false_admin_is_refused() {
        let stuck = user("Stuck", Role::Admin, Permissions::Granted(PermissionFlags::NONE), false);
        let mut w = World::new(vec![stuck.clone()]);

        let commands = w.send(Event::RequestClose);
        assert_eq!(w.state.phase, Phase::BlockedClose);
        assert!(w.state.error.as_ref().unwrap().contains("Stuck"));
        assert_eq!(w.state.is_highlighted(stuck.id), Some(HighlightTone::Error));
        assert!(!commands.contains(&Command::Close));

        let highlight_id = w.state.highlight.as_ref().unwrap().id;
        assert!(commands.contains(&Command::ClearHighlightAfter {
            highlight_id,
            after: HIGHLIGHT_DURATION
        }));

        // Highlight fades, message stays.
        w.send(Event::HighlightExpired { highlight_id });
        assert!(w.state.highlight.is_none());
        assert!(w.state.error.is_some());
    }

    #[test]
    fn fixing_the_offender_clears_the_block_message() {
        let stuck = user("Stuck", Role::Admin, Permissions::Granted(PermissionFlags::NONE), false);
        let mut w = World::new(vec![stuck.clone()]);
        w.send(Event::RequestClose);

        w.send(Event::TogglePermission { user_id: stuck.id, action: Action::Edit, value: true });
        assert!(w.state.error.is_none());
        assert!(w.state.blocked_by.is_empty());
        assert_eq!(w.state.phase, Phase::EditingPermissions);
    }

    #[test]
    fn stale_highlight_expiry_is_ignored() {
        let stuck = user("Stuck", Role::Admin, Permissions::Granted(PermissionFlags::NONE), false);
        let mut w = World::new(vec![stuck]);
        w.send(Event::RequestClose);
        let first = w.state.highlight.as_ref().unwrap().id;
        w.send(Event::RequestClose);
        w.send(Event::HighlightExpired { highlight_id: first });
        assert!(w.state.highlight.is_some());
    }

    #[test]
    fn promote_toggle_then_save_all_and_close() {
        let member = user("User", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![member.clone()]);

        let promoted = w.promote(member.id);
        w.send(Event::RoleChangeApplied { user: promoted });
        w.send(Event::RequestClose);
        assert_eq!(w.state.phase, Phase::BlockedClose);

        w.send(Event::TogglePermission { user_id: member.id, action: Action::Add, value: true });
        w.send(Event::RequestClose);
        assert_eq!(w.state.phase, Phase::ConfirmDiscardOrSave);

        let commands = w.send(Event::SaveAllAndClose);
        let expected = PermissionFlags::new(true, false, false);
        assert_eq!(
            commands,
            vec![Command::SaveAll { drafts: vec![(member.id, expected)] }]
        );

        let mut saved = w.users[1].clone();
        saved.permissions = Permissions::Granted(expected);
        w.replace(saved.clone());
        let commands = w.send(Event::PermissionsSaved { user: saved });
        assert_eq!(commands, vec![Command::Close]);
        assert!(w.state.is_closed());
        assert!(w.state.reminder.is_none());
    }

    #[test]
    fn failed_save_keeps_drafts_and_does_not_close() {
        let a = user("A", Role::Admin, Permissions::FullAccess, false);
        let b = user("B", Role::Admin, Permissions::FullAccess, false);
        let mut w = World::new(vec![a.clone(), b.clone()]);
        w.send(Event::TogglePermission { user_id: a.id, action: Action::Add, value: false });
        w.send(Event::TogglePermission { user_id: b.id, action: Action::Add, value: false });
        w.send(Event::RequestClose);
        w.send(Event::SaveAllAndClose);

        let mut saved = a.clone();
        saved.permissions = Permissions::Granted(PermissionFlags::new(false, true, true));
        w.replace(saved.clone());
        assert!(w.send(Event::PermissionsSaved { user: saved }).is_empty());

        let commands = w.send(Event::PermissionsSaveFailed {
            user_id: b.id,
            message: "Database error occurred".to_string(),
        });
        assert_eq!(commands, vec![Command::Refetch]);
        assert!(!w.state.is_closed());
        assert!(!w.state.closing_after_save);
        assert!(w.state.drafts.contains_key(&b.id));
        assert!(!w.state.drafts.contains_key(&a.id));
        assert_eq!(w.state.error.as_deref(), Some("Database error occurred"));
    }

    #[test]
    fn discard_reruns_guard_for_unresolved_reminder() {
        let member = user("User", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![member.clone()]);
        let promoted = w.promote(member.id);
        w.send(Event::RoleChangeApplied { user: promoted });
        w.send(Event::TogglePermission { user_id: member.id, action: Action::Add, value: true });
        w.send(Event::RequestClose);
        assert_eq!(w.state.phase, Phase::ConfirmDiscardOrSave);

        let commands = w.send(Event::DiscardDrafts);
        assert!(w.state.drafts.is_empty());
        assert_eq!(w.state.phase, Phase::BlockedClose);
        assert!(!commands.contains(&Command::Close));
    }

    #[test]
    fn prompt_is_modal() {
        let admin = user("Ann", Role::Admin, Permissions::FullAccess, false);
        let mut w = World::new(vec![admin.clone()]);
        w.send(Event::TogglePermission { user_id: admin.id, action: Action::Add, value: false });
        w.send(Event::RequestClose);

        w.send(Event::TogglePermission { user_id: admin.id, action: Action::Edit, value: false });
        assert_eq!(
            w.state.drafts.get(&admin.id),
            Some(&PermissionFlags::new(false, true, true))
        );

        w.send(Event::CancelClose);
        assert_eq!(w.state.phase, Phase::EditingPermissions);
    }

    #[test]
    fn clean_close_emits_close() {
        let mut w = World::new(vec![]);
        assert_eq!(w.send(Event::RequestClose), vec![Command::Close]);
        assert!(w.state.is_closed());
        assert!(w.send(Event::RequestClose).is_empty());
    }

    #[test]
    fn role_failure_reports_server_message() {
        let member = user("Member", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![member.clone()]);
        w.send(Event::RequestRoleChange { user_id: member.id, new_role: Role::Admin });
        w.send(Event::ConfirmRoleChange);
        w.send(Event::RoleChangeFailed {
            user_id: member.id,
            message: "Only the seed admin can manage roles and permissions".to_string(),
        });
        assert_eq!(
            w.state.error.as_deref(),
            Some("Only the seed admin can manage roles and permissions")
        );

        w.send(Event::DismissError);
        assert!(w.state.error.is_none());
    }

    #[test]
    fn state_serializes() {
        let member = user("Member", Role::User, Permissions::FullAccess, false);
        let mut w = World::new(vec![member.clone()]);
        w.send(Event::RequestRoleChange { user_id: member.id, new_role: Role::Admin });
        let json = serde_json::to_value(&w.state).unwrap();
        let back: WorkflowState = serde_json::from_value(json).unwrap();
        assert_eq!(back, w.state);
    }
}
