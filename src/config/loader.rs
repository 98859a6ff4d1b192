//! Load [`ServiceConfig`] from environment variables and the optional JSON files it
//! points at (privilege table, role assignments).

use crate::authz::{PrivilegeTable, RoleAssignment, DEFAULT_TENANT_PREFIX};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use crate::extractors::REMOTE_USER_HEADER;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match get("DOCSTORE_BACKEND") {
            Some(v) => StoreBackend::from_str(&v).map_err(|reason| ConfigError::InvalidValue {
                key: "DOCSTORE_BACKEND",
                value: v,
                reason,
            })?,
            None => StoreBackend::Postgres,
        };

        let config = ServiceConfig {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            store: StoreConfig {
                backend,
                url: get("DOCSTORE_URL"),
                max_connections: parse_or("DOCSTORE_MAX_CONNECTIONS", get("DOCSTORE_MAX_CONNECTIONS"), DEFAULT_MAX_CONNECTIONS)?,
            },
            roles: RoleConfig {
                url: get("ROLEDB_URL"),
                schema: get("ROLEDB_SCHEMA").unwrap_or_else(|| DEFAULT_ROLEDB_SCHEMA.to_string()),
                assignments_path: get("ROLES_PATH").map(PathBuf::from),
            },
            policy: PolicyConfig {
                tenant_prefix: get("TENANT_DB_PREFIX").unwrap_or_else(|| DEFAULT_TENANT_PREFIX.to_string()),
                require_prefix: parse_bool("REQUIRE_TENANT_PREFIX", get("REQUIRE_TENANT_PREFIX"), true)?,
            },
            http: HttpConfig {
                auth_header: get("AUTH_USER_HEADER")
                    .map(|h| h.to_lowercase())
                    .unwrap_or_else(|| REMOTE_USER_HEADER.to_string()),
                max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), DEFAULT_MAX_UPLOAD_BYTES)?,
                link_field: get("GRIDFS_LINK_FIELD").unwrap_or_else(|| DEFAULT_LINK_FIELD.to_string()),
            },
            privileges_path: get("PRIVILEGES_PATH").map(PathBuf::from),
        };
        validate(&config)?;
        Ok(config)
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value: v,
        }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(v) = value else { return Ok(default) };
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: v,
            reason: "expected true or false".into(),
        }),
    }
}

/// Privilege table from `path` (`{"post": ["Writer", "Editor"], ...}`), or the
/// built-in defaults when no path is configured.
pub async fn load_privileges(path: Option<&Path>) -> Result<PrivilegeTable, ConfigError> {
    let Some(path) = path else {
        return Ok(PrivilegeTable::default());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let map: BTreeMap<String, Vec<String>> = serde_json::from_str(&text)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    PrivilegeTable::from_map(map)
}

/// Role assignments from a JSON array of `{"subject", "player", "role"}` objects.
pub async fn load_role_assignments(path: &Path) -> Result<Vec<RoleAssignment>, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}
