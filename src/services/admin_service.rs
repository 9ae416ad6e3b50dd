use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::models::UserRecord;
use crate::database::{StoreError, UserOrder, UserStore};
use crate::policy::{self, PolicyError};
use crate::types::{PermissionFlags, Permissions, Role, UserView};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("User {0} not found")]
    UserNotFound(Uuid),
    #[error("User {0} is already an admin")]
    AlreadyAdmin(Uuid),
    #[error("User {0} is not an admin")]
    NotAdmin(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Role and permission management. Every mutation is seed-only.
pub struct AdminService {
    users: Arc<dyn UserStore>,
    config: Arc<AppConfig>,
}

impl AdminService {
    pub fn new(users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { users, config }
    }

    pub async fn list_users(&self, actor: &UserView, order: UserOrder) -> Result<Vec<UserView>, AdminError> {
        policy::require_admin(actor)?;
        let users = self.users.list_users(order).await?;
        Ok(users.iter().map(|u| u.to_view(&self.config.security)).collect())
    }

    /// Promotion without explicit flags persists all-false, never full access,
    /// so a fresh admin must be configured before the manager can close.
    pub async fn make_admin(
        &self,
        actor: &UserView,
        target_id: Uuid,
        permissions: Option<PermissionFlags>,
    ) -> Result<UserView, AdminError> {
        let target = self.load_target(actor, target_id).await?;
        policy::authorize_role_change(actor, &target.to_view(&self.config.security))?;
        if target.role == Role::Admin {
            return Err(AdminError::AlreadyAdmin(target_id));
        }

        let flags = permissions.unwrap_or(PermissionFlags::NONE);
        let updated = self
            .users
            .update_role(target_id, Role::Admin, Permissions::Granted(flags))
            .await?;
        info!("User {} promoted {} to admin with {:?}", actor.id, target_id, flags);
        Ok(updated.to_view(&self.config.security))
    }

    pub async fn revoke_admin(&self, actor: &UserView, target_id: Uuid) -> Result<UserView, AdminError> {
        let target = self.load_target(actor, target_id).await?;
        policy::authorize_role_change(actor, &target.to_view(&self.config.security))?;
        if target.role != Role::Admin {
            return Err(AdminError::NotAdmin(target_id));
        }

        let updated = self
            .users
            .update_role(target_id, Role::User, Permissions::FullAccess)
            .await?;
        info!("User {} revoked admin from {}", actor.id, target_id);
        Ok(updated.to_view(&self.config.security))
    }

    pub async fn update_permissions(
        &self,
        actor: &UserView,
        target_id: Uuid,
        flags: PermissionFlags,
    ) -> Result<UserView, AdminError> {
        let target = self.load_target(actor, target_id).await?;
        policy::authorize_permission_edit(actor, &target.to_view(&self.config.security))?;
        if target.role != Role::Admin {
            return Err(AdminError::NotAdmin(target_id));
        }

        let updated = self
            .users
            .update_permissions(target_id, Permissions::Granted(flags))
            .await?;
        info!("User {} set permissions of {} to {:?}", actor.id, target_id, flags);
        Ok(updated.to_view(&self.config.security))
    }

    /// Rejects non-seed actors before revealing whether the target exists.
    async fn load_target(&self, actor: &UserView, target_id: Uuid) -> Result<UserRecord, AdminError> {
        if !actor.is_seed {
            warn!("User {} attempted a seed-only change on {}", actor.id, target_id);
            return Err(PolicyError::SeedRequired.into());
        }
        self.users
            .find_user(target_id)
            .await?
            .ok_or(AdminError::UserNotFound(target_id))
    }
}
