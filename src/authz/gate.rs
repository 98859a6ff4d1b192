//! Named privileges mapped to the roles that grant them.
//!
//! Routes declare the privilege they need by name when the router is built; an
//! unregistered name fails router construction instead of surfacing per request.

use super::{ResourceAddress, RoleDirectory};
use crate::error::{ConfigError, StoreError};
use crate::extractors::CallerIdentity;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub const PRIVILEGE_READ: &str = "read";
pub const PRIVILEGE_POST: &str = "post";
pub const PRIVILEGE_EDIT: &str = "edit";

pub const ROLE_READER: &str = "Reader";
pub const ROLE_WRITER: &str = "Writer";
pub const ROLE_EDITOR: &str = "Editor";

#[derive(Clone, Debug)]
pub struct PrivilegeTable {
    grants: HashMap<String, Arc<HashSet<String>>>,
}

impl Default for PrivilegeTable {
    fn default() -> Self {
        let defaults: [(&str, &[&str]); 3] = [
            (PRIVILEGE_READ, &[ROLE_READER, ROLE_WRITER, ROLE_EDITOR]),
            (PRIVILEGE_POST, &[ROLE_WRITER, ROLE_EDITOR]),
            (PRIVILEGE_EDIT, &[ROLE_EDITOR]),
        ];
        let grants = defaults
            .iter()
            .map(|(name, roles)| {
                let roles: HashSet<String> = roles.iter().map(|r| r.to_string()).collect();
                (name.to_string(), Arc::new(roles))
            })
            .collect();
        PrivilegeTable { grants }
    }
}

impl PrivilegeTable {
    /// Build from `{"privilege": ["Role", ...]}`. Names must be non-empty and every
    /// privilege must be granted by at least one role.
    pub fn from_map(map: BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut grants = HashMap::new();
        for (name, roles) in map {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::Privileges("empty privilege name".into()));
            }
            let roles: HashSet<String> = roles
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
            if roles.is_empty() {
                return Err(ConfigError::Privileges(format!(
                    "privilege '{}' is granted by no role",
                    name
                )));
            }
            grants.insert(name, Arc::new(roles));
        }
        Ok(PrivilegeTable { grants })
    }

    pub fn contains(&self, privilege: &str) -> bool {
        self.grants.contains_key(privilege)
    }

    pub fn privileges(&self) -> impl Iterator<Item = &str> {
        self.grants.keys().map(String::as_str)
    }

    /// Resolve a declared privilege into a gate.
    pub fn gate(&self, privilege: &str) -> Result<PrivilegeGate, ConfigError> {
        let roles = self
            .grants
            .get(privilege)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPrivilege(privilege.to_string()))?;
        Ok(PrivilegeGate {
            privilege: privilege.to_string(),
            roles,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PrivilegeGate {
    privilege: String,
    roles: Arc<HashSet<String>>,
}

impl PrivilegeGate {
    pub fn privilege(&self) -> &str {
        &self.privilege
    }

    /// Whether `user` holds any role granting this privilege on the address's subject.
    pub async fn permits(
        &self,
        directory: &dyn RoleDirectory,
        user: &CallerIdentity,
        address: &ResourceAddress,
    ) -> Result<bool, StoreError> {
        let held = directory.roles_for(user.name(), &address.subject).await?;
        Ok(held.iter().any(|role| self.roles.contains(role)))
    }
}
