use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::CatalogItem;
use crate::database::{CatalogStore, StoreError};
use crate::policy::{self, PolicyError};
use crate::types::{Action, Resource, UserView};

const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("{resource} {id} not found")]
    NotFound { resource: Resource, id: Uuid },
    #[error("Validation failed")]
    Validation(HashMap<String, String>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writable fields of a catalog entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl CatalogInput {
    fn validate(&self) -> Result<(), CatalogError> {
        let mut field_errors = HashMap::new();
        let title = self.title.trim();
        if title.is_empty() {
            field_errors.insert("title".to_string(), "Title cannot be empty".to_string());
        } else if title.chars().count() > MAX_TITLE_LENGTH {
            field_errors.insert(
                "title".to_string(),
                format!("Title must be at most {} characters", MAX_TITLE_LENGTH),
            );
        }
        if let Some(raw) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            if url::Url::parse(raw.trim()).is_err() {
                field_errors.insert("url".to_string(), "Invalid URL".to_string());
            }
        }

        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(field_errors))
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Topics, materials, tools, categories and source-code entries. Reads are
/// open to any signed-in user; writes go through the authorization policy.
pub struct CatalogService {
    items: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(items: Arc<dyn CatalogStore>) -> Self {
        Self { items }
    }

    pub async fn list(&self, resource: Resource) -> Result<Vec<CatalogItem>, CatalogError> {
        Ok(self.items.list_items(resource).await?)
    }

    pub async fn get(&self, resource: Resource, id: Uuid) -> Result<CatalogItem, CatalogError> {
        self.items
            .find_item(resource, id)
            .await?
            .ok_or(CatalogError::NotFound { resource, id })
    }

    pub async fn create(
        &self,
        actor: &UserView,
        resource: Resource,
        input: CatalogInput,
    ) -> Result<CatalogItem, CatalogError> {
        self.authorize(actor, resource, Action::Add)?;
        input.validate()?;

        let now = Utc::now();
        let item = CatalogItem {
            id: Uuid::new_v4(),
            resource,
            title: input.title.trim().to_string(),
            description: clean(input.description),
            url: clean(input.url),
            category: clean(input.category),
            created_by: actor.id,
            created_at: now,
            updated_at: now,
        };
        let item = self.items.insert_item(item).await?;
        info!("User {} added {} {}", actor.id, resource, item.id);
        Ok(item)
    }

    pub async fn update(
        &self,
        actor: &UserView,
        resource: Resource,
        id: Uuid,
        input: CatalogInput,
    ) -> Result<CatalogItem, CatalogError> {
        self.authorize(actor, resource, Action::Edit)?;
        input.validate()?;

        let mut item = self.get(resource, id).await?;
        item.title = input.title.trim().to_string();
        item.description = clean(input.description);
        item.url = clean(input.url);
        item.category = clean(input.category);
        item.updated_at = Utc::now();

        let item = self.items.update_item(item).await?;
        info!("User {} edited {} {}", actor.id, resource, id);
        Ok(item)
    }

    pub async fn delete(&self, actor: &UserView, resource: Resource, id: Uuid) -> Result<(), CatalogError> {
        self.authorize(actor, resource, Action::Delete)?;
        match self.items.delete_item(resource, id).await {
            Ok(()) => {
                info!("User {} deleted {} {}", actor.id, resource, id);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(CatalogError::NotFound { resource, id }),
            Err(e) => Err(e.into()),
        }
    }

    fn authorize(&self, actor: &UserView, resource: Resource, action: Action) -> Result<(), CatalogError> {
        policy::authorize(actor, resource, action).map_err(|e| {
            warn!("Denied {} on {} for user {}: {}", action, resource, actor.id, e);
            CatalogError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::types::{PermissionFlags, Permissions, Role};

    fn actor(role: Role, permissions: Permissions) -> UserView {
        UserView {
            id: Uuid::new_v4(),
            email: "actor@example.com".to_string(),
            name: "Actor".to_string(),
            role,
            permissions,
            is_seed: false,
            created_at: Utc::now(),
        }
    }

    fn input(title: &str) -> CatalogInput {
        CatalogInput {
            title: title.to_string(),
            ..CatalogInput::default()
        }
    }

    #[tokio::test]
    async fn add_only_admin_cannot_delete() {
        let service = CatalogService::new(Arc::new(MemoryStore::new()));
        let admin = actor(Role::Admin, Permissions::Granted(PermissionFlags::new(true, false, false)));

        let item = service.create(&admin, Resource::Tools, input("Notebook")).await.unwrap();
        let err = service.delete(&admin, Resource::Tools, item.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::Policy(PolicyError::PermissionDenied { .. })));

        let err = service
            .update(&admin, Resource::Tools, item.id, input("Renamed"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Policy(PolicyError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn members_read_but_never_write() {
        let service = CatalogService::new(Arc::new(MemoryStore::new()));
        let member = actor(Role::User, Permissions::FullAccess);

        assert!(service.list(Resource::Topics).await.unwrap().is_empty());
        let err = service.create(&member, Resource::Topics, input("Rust")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Policy(PolicyError::AdminRequired)));
    }

    #[tokio::test]
    async fn validates_title_and_url() {
        let service = CatalogService::new(Arc::new(MemoryStore::new()));
        let admin = actor(Role::Admin, Permissions::FullAccess);

        let bad = CatalogInput {
            title: "  ".to_string(),
            url: Some("not a url".to_string()),
            ..CatalogInput::default()
        };
        match service.create(&admin, Resource::Materials, bad).await {
            Err(CatalogError::Validation(fields)) => {
                assert!(fields.contains_key("title"));
                assert!(fields.contains_key("url"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn full_access_admin_round_trip() {
        let service = CatalogService::new(Arc::new(MemoryStore::new()));
        let admin = actor(Role::Admin, Permissions::FullAccess);

        let item = service.create(&admin, Resource::SourceCode, input("ai-locker")).await.unwrap();
        let edited = service
            .update(&admin, Resource::SourceCode, item.id, input("ai-locker-rs"))
            .await
            .unwrap();
        assert_eq!(edited.title, "ai-locker-rs");
        service.delete(&admin, Resource::SourceCode, item.id).await.unwrap();
        assert!(matches!(
            service.get(Resource::SourceCode, item.id).await,
            Err(CatalogError::NotFound { .. })
        ));
    }
}
