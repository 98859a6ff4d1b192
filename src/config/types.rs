//! Service configuration, read from the environment at startup.

use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DOCSTORE_URL: &str = "postgres://localhost/docstore";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ROLEDB_SCHEMA: &str = "site";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1 << 30;
pub const DEFAULT_LINK_FIELD: &str = "gridfs_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            _ => Err("expected postgres or memory".into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// `None` when DOCSTORE_URL is unset; the Postgres backend then falls back to
    /// [`DEFAULT_DOCSTORE_URL`].
    pub url: Option<String>,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn url_or_default(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_DOCSTORE_URL)
    }
}

#[derive(Clone, Debug)]
pub struct RoleConfig {
    /// Separate role database; defaults to the document store's pool.
    pub url: Option<String>,
    pub schema: String,
    /// JSON file of role assignments; when set, the directory is static.
    pub assignments_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub tenant_prefix: String,
    pub require_prefix: bool,
}

/// Per-request settings shared with handlers and guards.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub auth_header: String,
    pub max_upload_bytes: usize,
    pub link_field: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            auth_header: crate::extractors::REMOTE_USER_HEADER.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            link_field: DEFAULT_LINK_FIELD.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub store: StoreConfig,
    pub roles: RoleConfig,
    pub policy: PolicyConfig,
    pub http: HttpConfig,
    pub privileges_path: Option<PathBuf>,
}
