//! Document-store routes. Paths are grouped by the privilege they need so each group
//! gets its own guard stack; groups are merged per path with different methods.

use super::guards::{enforce_address_policy, require_identity, require_privilege, PrivilegeGuard};
use crate::authz::{PrivilegeTable, PRIVILEGE_EDIT, PRIVILEGE_POST};
use crate::error::ConfigError;
use crate::handlers::{
    delete_document, delete_file, drop_collection, drop_database, find_documents, get_document, get_file,
    get_linked_file, insert_document, list_collections, list_databases, put_file, replace_document,
    MAX_DOCUMENT_BYTES,
};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::ServiceBuilder;

/// Read routes: address policy only.
fn read_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/:db", get(list_collections))
        .route("/:db/:coll", get(find_documents))
        .route("/:db/:coll/:id", get(get_document))
        .route("/:db/gridfs/:id", get(get_file))
        .route("/:db/:coll/gridfs/:id", get(get_linked_file))
        .route_layer(from_fn_with_state(state.clone(), enforce_address_policy))
}

/// Attach the full guard stack for `privilege`. Unknown privileges fail here.
fn guarded(
    router: Router<AppState>,
    state: &AppState,
    privileges: &PrivilegeTable,
    privilege: &str,
) -> Result<Router<AppState>, ConfigError> {
    let guard = PrivilegeGuard {
        state: state.clone(),
        gate: privileges.gate(privilege)?,
    };
    Ok(router.route_layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), enforce_address_policy))
            .layer(from_fn_with_state(state.clone(), require_identity))
            .layer(from_fn_with_state(guard, require_privilege)),
    ))
}

fn post_routes(state: &AppState) -> Router<AppState> {
    let upload_limit = DefaultBodyLimit::max(state.http.max_upload_bytes);
    Router::new()
        .route("/:db/:coll/", post(insert_document))
        .route("/:db/:coll", post(insert_document))
        .route(
            "/:db/:coll/:id",
            put(replace_document).post(replace_document).delete(delete_document),
        )
        .route("/:db/gridfs/", put(put_file).post(put_file).layer(upload_limit))
        .route("/:db/gridfs/:id", delete(delete_file))
}

fn edit_routes() -> Router<AppState> {
    Router::new()
        .route("/:db", delete(drop_database))
        .route("/:db/:coll", delete(drop_collection))
}

/// Document API. Read routes need no identity; post and edit routes resolve their
/// privilege gates from `privileges` now.
pub fn document_routes(state: &AppState, privileges: &PrivilegeTable) -> Result<Router<AppState>, ConfigError> {
    let posts = guarded(post_routes(state), state, privileges, PRIVILEGE_POST)?
        .layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES));
    let edits = guarded(edit_routes(), state, privileges, PRIVILEGE_EDIT)?;
    Ok(Router::new()
        .route("/", get(list_databases))
        .merge(read_routes(state))
        .merge(posts)
        .merge(edits))
}
