//! Router assembly.

mod common;
mod documents;
mod guards;

pub use common::common_routes;
pub use documents::document_routes;
pub use guards::{enforce_address_policy, require_identity, require_privilege, PrivilegeGuard};

use crate::authz::PrivilegeTable;
use crate::error::ConfigError;
use crate::state::AppState;
use axum::Router;

/// Full application router.
pub fn app(state: AppState, privileges: &PrivilegeTable) -> Result<Router, ConfigError> {
    let api = document_routes(&state, privileges)?;
    Ok(common_routes().merge(api).with_state(state))
}
