//! Authorization: address policy, role directory and privilege gates.

mod gate;
mod policy;
mod roles;

pub use gate::{
    PrivilegeGate, PrivilegeTable, PRIVILEGE_EDIT, PRIVILEGE_POST, PRIVILEGE_READ, ROLE_EDITOR,
    ROLE_READER, ROLE_WRITER,
};
pub use policy::{AddressPolicy, ResourceAddress, DEFAULT_RESERVED, DEFAULT_TENANT_PREFIX};
pub use roles::{PgRoleDirectory, RoleAssignment, RoleDirectory, StaticRoleDirectory};
