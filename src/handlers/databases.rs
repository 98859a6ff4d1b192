//! Database and collection listings, database drop.

use crate::authz::ResourceAddress;
use crate::error::AppError;
use crate::extractors::CallerIdentity;
use crate::handlers::store_failure;
use crate::response::{status_ok, JsonText, StatusBody};
use crate::state::AppState;
use axum::extract::{Extension, State};

/// GET / : databases this service exposes.
pub async fn list_databases(State(state): State<AppState>) -> Result<JsonText<Vec<String>>, AppError> {
    let names = state.documents.list_databases().await.map_err(|e| {
        tracing::error!(op = "list_databases", error = %e, "store operation failed");
        AppError::Store(e)
    })?;
    Ok(JsonText(state.policy.visible_databases(names)))
}

/// GET /:db
pub async fn list_collections(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
) -> Result<JsonText<Vec<String>>, AppError> {
    let names = state
        .documents
        .list_collections(&address.database)
        .await
        .map_err(|e| store_failure("list_collections", &address, e))?;
    Ok(JsonText(state.policy.visible_collections(names)))
}

/// DELETE /:db
pub async fn drop_database(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
    caller: CallerIdentity,
) -> Result<JsonText<StatusBody<()>>, AppError> {
    state
        .documents
        .drop_database(&address.database)
        .await
        .map_err(|e| store_failure("drop_database", &address, e))?;
    tracing::info!(database = %address.database, user = caller.name(), "dropped database");
    Ok(status_ok(()))
}
