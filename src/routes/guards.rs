//! Route guards run in order: address policy, authentication, privilege.

use crate::authz::{PrivilegeGate, ResourceAddress};
use crate::error::AppError;
use crate::extractors::CallerIdentity;
use crate::state::AppState;
use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;

/// Reject databases outside the address policy and record the resolved address.
pub async fn enforce_address_policy(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let database = params.get("db").map(String::as_str).unwrap_or("");
    let address = state
        .policy
        .address(database, params.get("coll").map(String::as_str), params.get("id").map(String::as_str))
        .map_err(|e| {
            tracing::warn!(database, method = %request.method(), "address policy rejected request");
            e
        })?;
    request.extensions_mut().insert(address);
    Ok(next.run(request).await)
}

/// Require the trusted identity header.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity =
        CallerIdentity::from_headers(request.headers(), &state.http.auth_header).ok_or(AppError::Unauthenticated)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// State for [`require_privilege`]: the gate resolved when the router was built.
#[derive(Clone)]
pub struct PrivilegeGuard {
    pub state: AppState,
    pub gate: PrivilegeGate,
}

pub async fn require_privilege(
    State(guard): State<PrivilegeGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let address = request
        .extensions()
        .get::<ResourceAddress>()
        .cloned()
        .ok_or_else(|| AppError::AddressPolicy(String::new()))?;
    let user = request
        .extensions()
        .get::<CallerIdentity>()
        .cloned()
        .ok_or(AppError::Unauthenticated)?;

    let allowed = guard
        .gate
        .permits(guard.state.roles.as_ref(), &user, &address)
        .await
        .map_err(|e| {
            tracing::error!(op = "roles_for", user = user.name(), subject = %address.subject, error = %e, "role lookup failed");
            AppError::Store(e)
        })?;
    if !allowed {
        tracing::warn!(
            user = user.name(),
            privilege = guard.gate.privilege(),
            subject = %address.subject,
            "privilege denied"
        );
        return Err(AppError::Forbidden {
            user: user.name().to_string(),
            privilege: guard.gate.privilege().to_string(),
            subject: address.subject,
        });
    }
    Ok(next.run(request).await)
}
