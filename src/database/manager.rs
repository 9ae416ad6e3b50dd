use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::database::memory::MemoryStore;
use crate::database::postgres::PgStore;
use crate::database::store::{CatalogStore, StoreError, UserStore};

/// The two store handles the API works against.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn CatalogStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            catalog: store,
        }
    }

    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            catalog: store,
        }
    }
}

/// Opens Postgres when a URL is configured, otherwise an in-memory store.
pub async fn open_stores(config: &DatabaseConfig) -> Result<Stores, StoreError> {
    match &config.url {
        Some(url) => {
            let pool = connect(url, config).await?;
            let store = PgStore::new(pool);
            store.ensure_schema().await?;
            Ok(Stores::postgres(store))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
            Ok(Stores::memory())
        }
    }
}

pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let redacted = redact_url(url)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect(url)
        .await?;

    info!("Created database pool for: {}", redacted);
    Ok(pool)
}

/// Connection string with the password masked, for logs.
fn redact_url(raw: &str) -> Result<String, StoreError> {
    let mut url = url::Url::parse(raw).map_err(|_| StoreError::InvalidDatabaseUrl)?;
    if url.password().is_some() {
        url.set_password(Some("****"))
            .map_err(|_| StoreError::InvalidDatabaseUrl)?;
    }
    Ok(url.into())
}
