use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{PermissionFlags, Role};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingRoleConfirmation,
    EditingPermissions,
    BlockedClose,
    ConfirmDiscardOrSave,
    Closed,
}

/// A role change awaiting the operator's confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub user_id: Uuid,
    pub new_role: Role,
    pub user_name: String,
}

/// The most recently promoted admin, who must be given a permission before
/// the manager can close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdminReminder {
    pub user_id: Uuid,
    pub user_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighlightTone {
    Info,
    Error,
}

/// Rows to draw attention to. `id` lets a delayed expiry ignore a newer highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: u64,
    pub tone: HighlightTone,
    pub user_ids: Vec<Uuid>,
}

/// The whole workflow state. Only [`super::reduce`] produces new values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub phase: Phase,
    pub pending_change: Option<PendingChange>,
    /// Unsaved permission edits, always complete triples.
    pub drafts: BTreeMap<Uuid, PermissionFlags>,
    pub reminder: Option<NewAdminReminder>,
    pub highlight: Option<Highlight>,
    pub error: Option<String>,
    /// Offenders of the last refused close; empty once resolved.
    pub blocked_by: Vec<Uuid>,
    /// Set by save-all-and-close; cleared when the sequence ends either way.
    pub closing_after_save: bool,
    pub next_highlight_id: u64,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    pub fn has_drafts(&self) -> bool {
        !self.drafts.is_empty()
    }

    pub fn is_highlighted(&self, user_id: Uuid) -> Option<HighlightTone> {
        self.highlight
            .as_ref()
            .filter(|h| h.user_ids.contains(&user_id))
            .map(|h| h.tone)
    }

    /// Phase implied by the current data once nothing modal is showing.
    pub(crate) fn settled_phase(&self) -> Phase {
        if self.pending_change.is_some() {
            Phase::AwaitingRoleConfirmation
        } else if !self.blocked_by.is_empty() {
            Phase::BlockedClose
        } else if self.has_drafts() {
            Phase::EditingPermissions
        } else {
            Phase::Idle
        }
    }

    pub(crate) fn set_highlight(&mut self, tone: HighlightTone, user_ids: Vec<Uuid>) -> u64 {
        self.next_highlight_id += 1;
        let id = self.next_highlight_id;
        self.highlight = Some(Highlight { id, tone, user_ids });
        id
    }

    /// Drops every client-side trace of a user (draft, reminder, highlight).
    pub(crate) fn forget_user(&mut self, user_id: Uuid) {
        self.drafts.remove(&user_id);
        if self.reminder.as_ref().is_some_and(|r| r.user_id == user_id) {
            self.reminder = None;
        }
        if let Some(highlight) = &mut self.highlight {
            highlight.user_ids.retain(|id| *id != user_id);
            if highlight.user_ids.is_empty() {
                self.highlight = None;
            }
        }
    }
}
