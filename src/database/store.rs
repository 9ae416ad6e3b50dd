use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{CatalogItem, UserRecord};
use crate::types::{Permissions, Resource, Role};

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Duplicate(String),

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOrderField {
    CreatedAt,
    Name,
    Email,
    Role,
}

/// Sort order for the admin user list: a field name, `-` prefix for descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserOrder {
    pub field: UserOrderField,
    pub descending: bool,
}

impl Default for UserOrder {
    fn default() -> Self {
        Self {
            field: UserOrderField::CreatedAt,
            descending: false,
        }
    }
}

impl FromStr for UserOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "created_at" | "createdAt" => UserOrderField::CreatedAt,
            "name" => UserOrderField::Name,
            "email" => UserOrderField::Email,
            "role" => UserOrderField::Role,
            other => return Err(format!("cannot order users by '{}'", other)),
        };
        Ok(Self { field, descending })
    }
}

impl UserOrder {
    /// Column name for SQL ORDER BY; only ever one of a fixed set.
    pub fn column(&self) -> &'static str {
        match self.field {
            UserOrderField::CreatedAt => "created_at",
            UserOrderField::Name => "name",
            UserOrderField::Email => "email",
            UserOrderField::Role => "role",
        }
    }

    pub fn sort(&self, users: &mut [UserRecord]) {
        users.sort_by(|a, b| {
            let ordering = match self.field {
                UserOrderField::CreatedAt => a.created_at.cmp(&b.created_at),
                UserOrderField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                UserOrderField::Email => a.email.cmp(&b.email),
                UserOrderField::Role => a.role.as_str().cmp(b.role.as_str()),
            };
            if self.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Duplicate` when the email is taken.
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Claims a live reset token: clears both reset fields and returns the
    /// account in one step, so a token can only be redeemed once. Unknown
    /// and expired digests yield `None`.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, StoreError>;

    async fn list_users(&self, order: UserOrder) -> Result<Vec<UserRecord>, StoreError>;

    async fn update_role(
        &self,
        id: Uuid,
        role: Role,
        permissions: Permissions,
    ) -> Result<UserRecord, StoreError>;

    async fn update_permissions(&self, id: Uuid, permissions: Permissions) -> Result<UserRecord, StoreError>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Replaces the password hash and clears any reset token.
    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_items(&self, resource: Resource) -> Result<Vec<CatalogItem>, StoreError>;

    async fn find_item(&self, resource: Resource, id: Uuid) -> Result<Option<CatalogItem>, StoreError>;

    async fn insert_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError>;

    async fn update_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError>;

    async fn delete_item(&self, resource: Resource, id: Uuid) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_order_by() {
        assert_eq!("name".parse::<UserOrder>().unwrap().field, UserOrderField::Name);
        let desc: UserOrder = "-createdAt".parse().unwrap();
        assert!(desc.descending);
        assert_eq!(desc.column(), "created_at");
        assert!("password_hash".parse::<UserOrder>().is_err());
    }

    #[test]
    fn sorts_names_case_insensitively() {
        let mut users = vec![
            UserRecord::new("bob".into(), "b@x.io".into(), String::new(), Role::User),
            UserRecord::new("Alice".into(), "a@x.io".into(), String::new(), Role::User),
        ];
        "name".parse::<UserOrder>().unwrap().sort(&mut users);
        assert_eq!(users[0].name, "Alice");
        "-name".parse::<UserOrder>().unwrap().sort(&mut users);
        assert_eq!(users[0].name, "bob");
    }
}
