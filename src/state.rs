//! Shared application state for all routes.

use crate::authz::{AddressPolicy, PgRoleDirectory, RoleDirectory, StaticRoleDirectory};
use crate::config::{load_role_assignments, HttpConfig, ServiceConfig, StoreBackend};
use crate::error::ConfigError;
use crate::store::{DocumentStore, LargeObjectStore, MemoryStore, PgStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub files: Arc<dyn LargeObjectStore>,
    pub roles: Arc<dyn RoleDirectory>,
    pub policy: Arc<AddressPolicy>,
    pub http: Arc<HttpConfig>,
}

impl AppState {
    /// In-memory state with the given role directory and default settings.
    pub fn in_memory(roles: impl RoleDirectory + 'static) -> Self {
        let store = Arc::new(MemoryStore::new());
        AppState {
            documents: store.clone(),
            files: store,
            roles: Arc::new(roles),
            policy: Arc::new(AddressPolicy::default()),
            http: Arc::new(HttpConfig::default()),
        }
    }

    pub fn with_policy(mut self, policy: AddressPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = Arc::new(http);
        self
    }

    /// Build stores and the role directory described by `config`. Pools connect lazily
    /// so the service starts while the database is still coming up.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let (documents, files, store_pool): (Arc<dyn DocumentStore>, Arc<dyn LargeObjectStore>, Option<PgPool>) =
            match config.store.backend {
                StoreBackend::Memory => {
                    let store = Arc::new(MemoryStore::new());
                    (store.clone(), store, None)
                }
                StoreBackend::Postgres => {
                    if config.store.url.is_none() {
                        tracing::warn!(
                            url = config.store.url_or_default(),
                            "DOCSTORE_URL not set, using default"
                        );
                    }
                    let pool = lazy_pool("DOCSTORE_URL", config.store.url_or_default(), config.store.max_connections)?;
                    let store = Arc::new(PgStore::new(pool.clone()));
                    (store.clone(), store, Some(pool))
                }
            };

        let roles = role_directory(config, store_pool).await?;
        let policy = AddressPolicy::new(config.policy.tenant_prefix.clone(), config.policy.require_prefix);
        Ok(AppState {
            documents,
            files,
            roles,
            policy: Arc::new(policy),
            http: Arc::new(config.http.clone()),
        })
    }
}

fn lazy_pool(key: &'static str, url: &str, max_connections: u32) -> Result<PgPool, ConfigError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_lazy(url)
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: url.to_string(),
            reason: e.to_string(),
        })
}

async fn role_directory(
    config: &ServiceConfig,
    store_pool: Option<PgPool>,
) -> Result<Arc<dyn RoleDirectory>, ConfigError> {
    if let Some(path) = &config.roles.assignments_path {
        let assignments = load_role_assignments(path).await?;
        tracing::info!(path = %path.display(), count = assignments.len(), "loaded static role assignments");
        return Ok(Arc::new(StaticRoleDirectory::from_assignments(assignments)));
    }
    let pool = match (&config.roles.url, store_pool) {
        (Some(url), _) => lazy_pool("ROLEDB_URL", url, config.store.max_connections)?,
        (None, Some(pool)) => pool,
        (None, None) => {
            tracing::warn!("no role directory configured; every mutation will be forbidden");
            return Ok(Arc::new(StaticRoleDirectory::new()));
        }
    };
    let directory = PgRoleDirectory::new(pool, config.roles.schema.clone());
    if let Err(e) = directory.ensure_table().await {
        tracing::warn!(schema = %config.roles.schema, error = %e, "could not ensure role_assignments table");
    }
    Ok(Arc::new(directory))
}
