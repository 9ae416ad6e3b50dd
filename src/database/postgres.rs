use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::catalog::CatalogRow;
use crate::database::models::user::UserRow;
use crate::database::models::{CatalogItem, UserRecord};
use crate::database::store::{CatalogStore, StoreError, UserOrder, UserStore};
use crate::types::{PermissionFlags, Permissions, Resource, Role};

const SCHEMA: [&str; 3] = [
    r#"CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    permissions JSONB,
    reset_token_hash TEXT,
    reset_token_expires_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
    r#"CREATE TABLE IF NOT EXISTS catalog_items (
    id UUID PRIMARY KEY,
    resource TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    url TEXT,
    category TEXT,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
    "CREATE INDEX IF NOT EXISTS catalog_items_resource_idx ON catalog_items (resource)",
];

const USER_COLUMNS: &str = "id, email, name, password_hash, role, permissions, \
    reset_token_hash, reset_token_expires_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, resource, title, description, url, category, created_by, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates tables on first start.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn permissions_json(permissions: Permissions) -> Option<Json<PermissionFlags>> {
    permissions.granted().map(Json)
}

fn map_insert_error(err: sqlx::Error, email: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(email.to_string()),
        _ => StoreError::Sqlx(err),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, StoreError> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(permissions_json(user.permissions))
            .bind(&user.reset_token_hash)
            .bind(user.reset_token_expires_at)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, &user.email))?;
        row.try_into()
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!(
            "UPDATE users SET reset_token_hash = NULL, reset_token_expires_at = NULL, updated_at = $2 \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > $2 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn list_users(&self, order: UserOrder) -> Result<Vec<UserRecord>, StoreError> {
        let direction = if order.descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY {} {}, id ASC",
            order.column(),
            direction
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn update_role(
        &self,
        id: Uuid,
        role: Role,
        permissions: Permissions,
    ) -> Result<UserRecord, StoreError> {
        let sql = format!(
            "UPDATE users SET role = $2, permissions = $3, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(role.as_str())
            .bind(permissions_json(permissions))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::NotFound(format!("User {} not found", id))),
        }
    }

    async fn update_permissions(&self, id: Uuid, permissions: Permissions) -> Result<UserRecord, StoreError> {
        let sql = format!(
            "UPDATE users SET permissions = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(permissions_json(permissions))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::NotFound(format!("User {} not found", id))),
        }
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, reset_token_hash = NULL, reset_token_expires_at = NULL, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_items(&self, resource: Resource) -> Result<Vec<CatalogItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM catalog_items WHERE resource = $1 ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, CatalogRow>(&sql)
            .bind(resource.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(CatalogItem::try_from).collect()
    }

    async fn find_item(&self, resource: Resource, id: Uuid) -> Result<Option<CatalogItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM catalog_items WHERE resource = $1 AND id = $2");
        let row = sqlx::query_as::<_, CatalogRow>(&sql)
            .bind(resource.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn insert_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError> {
        let sql = format!(
            "INSERT INTO catalog_items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CatalogRow>(&sql)
            .bind(item.id)
            .bind(item.resource.as_str())
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.url)
            .bind(&item.category)
            .bind(item.created_by)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn update_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError> {
        let sql = format!(
            "UPDATE catalog_items SET title = $3, description = $4, url = $5, category = $6, updated_at = $7 \
             WHERE resource = $1 AND id = $2 RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CatalogRow>(&sql)
            .bind(item.resource.as_str())
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.url)
            .bind(&item.category)
            .bind(item.updated_at)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::NotFound(format!("{} {} not found", item.resource, item.id))),
        }
    }

    async fn delete_item(&self, resource: Resource, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM catalog_items WHERE resource = $1 AND id = $2")
            .bind(resource.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{} {} not found", resource, id)));
        }
        Ok(())
    }
}
