//! Client side of the admin permission workflow: an HTTP client for the API
//! and a cached directory of users built on top of it.

pub mod directory;
pub mod http;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{PermissionFlags, UserView};

pub use directory::AdminDirectory;
pub use http::LockerClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with an error envelope.
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Not logged in")]
    NotAuthenticated,
}

impl ClientError {
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// The admin endpoints the access workflow depends on.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn current_user(&self) -> Result<UserView, ClientError>;

    async fn list_users(&self, order_by: Option<&str>) -> Result<Vec<UserView>, ClientError>;

    async fn make_admin(
        &self,
        user_id: Uuid,
        permissions: Option<PermissionFlags>,
    ) -> Result<UserView, ClientError>;

    async fn revoke_admin(&self, user_id: Uuid) -> Result<UserView, ClientError>;

    async fn update_permissions(
        &self,
        user_id: Uuid,
        permissions: PermissionFlags,
    ) -> Result<UserView, ClientError>;
}
