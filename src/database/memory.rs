use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{CatalogItem, UserRecord};
use crate::database::store::{CatalogStore, StoreError, UserOrder, UserStore};
use crate::types::{Permissions, Resource, Role};

/// Process-local store used when no `DATABASE_URL` is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    items: RwLock<HashMap<Uuid, CatalogItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn user_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("User {} not found", id))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(user.email));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| {
            u.reset_token_hash.as_deref() == Some(token_hash)
                && u.reset_token_expires_at.is_some_and(|at| at > now)
        }) else {
            return Ok(None);
        };
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn list_users(&self, order: UserOrder) -> Result<Vec<UserRecord>, StoreError> {
        let mut users: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
        order.sort(&mut users);
        Ok(users)
    }

    async fn update_role(
        &self,
        id: Uuid,
        role: Role,
        permissions: Permissions,
    ) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or_else(|| user_not_found(id))?;
        user.role = role;
        user.permissions = permissions;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_permissions(&self, id: Uuid, permissions: Permissions) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or_else(|| user_not_found(id))?;
        user.permissions = permissions;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or_else(|| user_not_found(id))?;
        user.reset_token_hash = token_hash;
        user.reset_token_expires_at = expires_at;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or_else(|| user_not_found(id))?;
        user.password_hash = password_hash;
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_items(&self, resource: Resource) -> Result<Vec<CatalogItem>, StoreError> {
        let mut items: Vec<CatalogItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|i| i.resource == resource)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn find_item(&self, resource: Resource, id: Uuid) -> Result<Option<CatalogItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items.get(&id).filter(|i| i.resource == resource).cloned())
    }

    async fn insert_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError> {
        self.items.write().await.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError> {
        let mut items = self.items.write().await;
        match items.get_mut(&item.id) {
            Some(existing) if existing.resource == item.resource => {
                *existing = item.clone();
                Ok(item)
            }
            _ => Err(StoreError::NotFound(format!("{} {} not found", item.resource, item.id))),
        }
    }

    async fn delete_item(&self, resource: Resource, id: Uuid) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        match items.get(&id) {
            Some(existing) if existing.resource == resource => {
                items.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!("{} {} not found", resource, id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PermissionFlags;

    fn user(email: &str) -> UserRecord {
        UserRecord::new("Test".to_string(), email.to_string(), "hash".to_string(), Role::User)
    }

    #[tokio::test]
    async fn rejects_duplicate_email() {
        let store = MemoryStore::new();
        store.insert_user(user("a@x.io")).await.unwrap();
        let err = store.insert_user(user("a@x.io")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn update_role_replaces_permissions() {
        let store = MemoryStore::new();
        let u = store.insert_user(user("a@x.io")).await.unwrap();

        let promoted = store
            .update_role(u.id, Role::Admin, Permissions::Granted(PermissionFlags::NONE))
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert_eq!(promoted.permissions, Permissions::Granted(PermissionFlags::NONE));

        let missing = store.update_role(Uuid::new_v4(), Role::User, Permissions::FullAccess).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn reset_token_is_claimed_once() {
        let store = MemoryStore::new();
        let u = store.insert_user(user("a@x.io")).await.unwrap();
        let now = Utc::now();
        store
            .set_reset_token(u.id, Some("digest".to_string()), Some(now + chrono::Duration::minutes(5)))
            .await
            .unwrap();

        let claimed = store.consume_reset_token("digest", now).await.unwrap().unwrap();
        assert_eq!(claimed.id, u.id);
        assert!(claimed.reset_token_hash.is_none());
        assert!(claimed.reset_token_expires_at.is_none());
        assert!(store.consume_reset_token("digest", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_reset_token_is_not_claimed() {
        let store = MemoryStore::new();
        let u = store.insert_user(user("a@x.io")).await.unwrap();
        let now = Utc::now();
        store
            .set_reset_token(u.id, Some("digest".to_string()), Some(now))
            .await
            .unwrap();

        assert!(store.consume_reset_token("digest", now).await.unwrap().is_none());
        assert!(store.consume_reset_token("other", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn catalog_items_are_scoped_by_resource() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let item = CatalogItem {
            id: Uuid::new_v4(),
            resource: Resource::Tools,
            title: "Notebook".to_string(),
            description: None,
            url: None,
            category: Some("Editors".to_string()),
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        store.insert_item(item.clone()).await.unwrap();

        assert_eq!(store.list_items(Resource::Tools).await.unwrap().len(), 1);
        assert!(store.find_item(Resource::Topics, item.id).await.unwrap().is_none());
        assert!(store.delete_item(Resource::Topics, item.id).await.is_err());
        store.delete_item(Resource::Tools, item.id).await.unwrap();
        assert!(store.list_items(Resource::Tools).await.unwrap().is_empty());
    }
}
