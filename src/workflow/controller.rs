use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::{AdminApi, AdminDirectory, ClientError};
use crate::types::UserView;
use crate::workflow::guard::{blocked_message, evaluate_close, CloseDecision};
use crate::workflow::reducer::{reduce, Command, Context, Event};
use crate::workflow::roster::{roster, RosterRow};
use crate::workflow::state::WorkflowState;

/// Work the caller has to do on the reducer's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ScrollIntoView { user_id: Uuid },
    /// Send `Event::HighlightExpired` once `after` has passed.
    ClearHighlightAfter { highlight_id: u64, after: Duration },
    Close,
}

/// Drives the workflow against a live directory, one event at a time.
/// After every server mutation the directory is refreshed before the outcome
/// is reduced. A directory left stale by a failed refresh is reloaded before
/// the next event.
pub struct AccessManager<A: AdminApi> {
    directory: AdminDirectory<A>,
    state: WorkflowState,
}

impl<A: AdminApi> AccessManager<A> {
    pub async fn open(api: A) -> Result<Self, ClientError> {
        Self::with_directory(AdminDirectory::new(api)).await
    }

    pub async fn with_directory(mut directory: AdminDirectory<A>) -> Result<Self, ClientError> {
        directory.refresh().await?;
        Ok(Self {
            directory,
            state: WorkflowState::new(),
        })
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn directory(&self) -> &AdminDirectory<A> {
        &self.directory
    }

    pub fn viewer(&self) -> Option<&UserView> {
        self.directory.me()
    }

    pub fn roster(&self) -> Vec<RosterRow> {
        match self.directory.me() {
            Some(viewer) => roster(&self.state, &Context::new(viewer, self.directory.users())),
            None => Vec::new(),
        }
    }

    pub fn close_decision(&self) -> CloseDecision {
        evaluate_close(&self.state, self.directory.users())
    }

    /// What would be left behind if the manager were abandoned without a
    /// close, e.g. when input ends.
    pub fn abandon_warning(&self) -> Option<String> {
        match self.close_decision() {
            CloseDecision::Block { offenders } => {
                Some(blocked_message(&offenders, &self.state, self.directory.users()))
            }
            CloseDecision::PromptSave => Some("Unsaved permission changes were not saved".to_string()),
            CloseDecision::Allow => None,
        }
    }

    pub async fn dispatch(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mut queue = VecDeque::new();
        if let Some(failure) = self.sync().await {
            queue.extend(self.apply(failure));
        }
        queue.extend(self.apply(event));

        while let Some(command) = queue.pop_front() {
            match command {
                Command::Promote { user_id } => {
                    let result = self.directory.api().make_admin(user_id, None).await;
                    for event in self.role_outcome(user_id, result).await {
                        queue.extend(self.apply(event));
                    }
                }
                Command::Demote { user_id } => {
                    let result = self.directory.api().revoke_admin(user_id).await;
                    for event in self.role_outcome(user_id, result).await {
                        queue.extend(self.apply(event));
                    }
                }
                Command::SavePermissions { user_id, permissions } => {
                    let result = self.directory.api().update_permissions(user_id, permissions).await;
                    for event in self.save_outcome(user_id, result).await {
                        queue.extend(self.apply(event));
                    }
                }
                Command::SaveAll { drafts } => {
                    for (user_id, permissions) in drafts {
                        let result = self.directory.api().update_permissions(user_id, permissions).await;
                        let failed = result.is_err();
                        for event in self.save_outcome(user_id, result).await {
                            queue.extend(self.apply(event));
                        }
                        if failed {
                            break;
                        }
                    }
                }
                Command::Refetch => {
                    self.directory.invalidate();
                    if let Some(event) = self.sync().await {
                        queue.extend(self.apply(event));
                    }
                }
                Command::ScrollIntoView { user_id } => effects.push(Effect::ScrollIntoView { user_id }),
                Command::ClearHighlightAfter { highlight_id, after } => {
                    effects.push(Effect::ClearHighlightAfter { highlight_id, after })
                }
                Command::Close => effects.push(Effect::Close),
            }
        }

        effects
    }

    fn apply(&mut self, event: Event) -> Vec<Command> {
        let Some(viewer) = self.directory.me() else {
            warn!("Workflow event {:?} dropped: directory has no current user", event);
            return Vec::new();
        };
        let ctx = Context::new(viewer, self.directory.users());
        let transition = reduce(&self.state, &ctx, event);
        self.state = transition.state;
        transition.commands
    }

    async fn role_outcome(&mut self, user_id: Uuid, result: Result<UserView, ClientError>) -> Vec<Event> {
        self.directory.invalidate();
        match result {
            Ok(user) => {
                debug!("Role of {} is now {}", user.id, user.role);
                let mut events = Vec::new();
                let refresh_failure = self.sync().await;
                events.push(Event::RoleChangeApplied { user });
                events.extend(refresh_failure);
                events
            }
            Err(e) => {
                warn!("Role change for {} failed: {}", user_id, e);
                vec![Event::RoleChangeFailed {
                    user_id,
                    message: e.to_string(),
                }]
            }
        }
    }

    async fn save_outcome(&mut self, user_id: Uuid, result: Result<UserView, ClientError>) -> Vec<Event> {
        self.directory.invalidate();
        match result {
            Ok(user) => {
                let mut events = Vec::new();
                let refresh_failure = self.sync().await;
                events.push(Event::PermissionsSaved { user });
                events.extend(refresh_failure);
                events
            }
            Err(e) => {
                warn!("Saving permissions for {} failed: {}", user_id, e);
                vec![Event::PermissionsSaveFailed {
                    user_id,
                    message: e.to_string(),
                }]
            }
        }
    }

    async fn sync(&mut self) -> Option<Event> {
        match self.directory.refresh_if_stale().await {
            Ok(()) => None,
            Err(e) => {
                warn!("Directory refresh failed: {}", e);
                Some(Event::RefreshFailed {
                    message: e.to_string(),
                })
            }
        }
    }
}
