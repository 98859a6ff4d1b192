//! Resource-address policy: which databases this service exposes at all, and the
//! authorization subject each one maps to.

use crate::error::AppError;
use std::collections::HashSet;

/// System databases never listed or touched.
pub const DEFAULT_RESERVED: &[&str] = &["admin", "config", "local"];

/// Prefix marking application (tenant) databases.
pub const DEFAULT_TENANT_PREFIX: &str = "cdb_";

const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// A request's target: database, optional collection and object id, plus the
/// subject privilege checks are evaluated against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceAddress {
    pub database: String,
    pub collection: Option<String>,
    pub id: Option<String>,
    pub subject: String,
}

impl ResourceAddress {
    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }
}

#[derive(Clone, Debug)]
pub struct AddressPolicy {
    reserved: HashSet<String>,
    tenant_prefix: String,
    require_prefix: bool,
}

impl Default for AddressPolicy {
    fn default() -> Self {
        AddressPolicy::new(DEFAULT_TENANT_PREFIX, true)
    }
}

impl AddressPolicy {
    pub fn new(tenant_prefix: impl Into<String>, require_prefix: bool) -> Self {
        AddressPolicy {
            reserved: DEFAULT_RESERVED.iter().map(|s| s.to_string()).collect(),
            tenant_prefix: tenant_prefix.into(),
            require_prefix,
        }
    }

    pub fn tenant_prefix(&self) -> &str {
        &self.tenant_prefix
    }

    pub fn is_reserved(&self, database: &str) -> bool {
        self.reserved.contains(database)
    }

    /// Subject derived from a database name: the tenant prefix stripped when present.
    pub fn subject(&self, database: &str) -> String {
        match database.strip_prefix(self.tenant_prefix.as_str()) {
            Some(rest) if !self.tenant_prefix.is_empty() => rest.to_string(),
            _ => database.to_string(),
        }
    }

    pub fn permits(&self, database: &str) -> bool {
        if database.is_empty() || self.is_reserved(database) {
            return false;
        }
        if self.require_prefix {
            return matches!(database.strip_prefix(self.tenant_prefix.as_str()), Some(rest) if !rest.is_empty());
        }
        true
    }

    /// Validate a database name and build the address for a request.
    pub fn address(
        &self,
        database: &str,
        collection: Option<&str>,
        id: Option<&str>,
    ) -> Result<ResourceAddress, AppError> {
        if !self.permits(database) {
            return Err(AppError::AddressPolicy(database.to_string()));
        }
        Ok(ResourceAddress {
            database: database.to_string(),
            collection: collection.map(str::to_string),
            id: id.map(str::to_string),
            subject: self.subject(database),
        })
    }

    /// Databases visible in listings.
    pub fn visible_databases(&self, names: Vec<String>) -> Vec<String> {
        names.into_iter().filter(|n| self.permits(n)).collect()
    }

    pub fn visible_collections(&self, names: Vec<String>) -> Vec<String> {
        names
            .into_iter()
            .filter(|n| !n.starts_with(SYSTEM_COLLECTION_PREFIX))
            .collect()
    }
}
