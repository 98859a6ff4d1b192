//! docstore-rest: REST front end for a document store with tenant-scoped
//! authorization and large-object (GridFS-style) files.

pub mod authz;
pub mod config;
pub mod document;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;

pub use authz::{AddressPolicy, PrivilegeTable, ResourceAddress, RoleDirectory, StaticRoleDirectory};
pub use config::{load_privileges, ServiceConfig};
pub use document::{Document, ObjectId, Value};
pub use error::{AppError, ConfigError, ParseError, StoreError};
pub use routes::app;
pub use state::AppState;
pub use store::{DocumentStore, LargeObjectStore, MemoryStore, PgStore};
