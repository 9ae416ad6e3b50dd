use tracing::debug;
use uuid::Uuid;

use crate::client::{AdminApi, ClientError};
use crate::types::UserView;

/// Cached view of the current user and the admin user list.
///
/// The cache is invalidated after every mutation and must be refreshed before
/// the workflow looks at it again; nothing here patches entries locally.
pub struct AdminDirectory<A: AdminApi> {
    api: A,
    order_by: Option<String>,
    me: Option<UserView>,
    users: Vec<UserView>,
    stale: bool,
}

impl<A: AdminApi> AdminDirectory<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            order_by: None,
            me: None,
            users: Vec::new(),
            stale: true,
        }
    }

    pub fn with_order(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn me(&self) -> Option<&UserView> {
        self.me.as_ref()
    }

    pub fn users(&self) -> &[UserView] {
        &self.users
    }

    pub fn find(&self, user_id: Uuid) -> Option<&UserView> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Reloads both the current user and the list. On failure the old
    /// snapshot is kept and stays marked stale.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let me = self.api.current_user().await?;
        let users = self.api.list_users(self.order_by.as_deref()).await?;
        debug!("Directory refreshed: {} users", users.len());

        self.me = Some(me);
        self.users = users;
        self.stale = false;
        Ok(())
    }

    pub async fn refresh_if_stale(&mut self) -> Result<(), ClientError> {
        if self.stale {
            self.refresh().await?;
        }
        Ok(())
    }
}
