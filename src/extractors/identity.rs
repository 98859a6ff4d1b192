//! Caller identity from a trusted upstream header (default `x-remote-user`).

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

/// Default header carrying the authenticated user name.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        CallerIdentity(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Read the identity header; missing, non-UTF-8 or blank values yield `None`.
    pub fn from_headers(headers: &HeaderMap, header: &str) -> Option<Self> {
        headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(CallerIdentity)
    }
}

/// Identity placed in request extensions by the authentication guard.
#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_trimmed_user_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REMOTE_USER_HEADER, HeaderValue::from_static("  alice "));
        let id = CallerIdentity::from_headers(&headers, REMOTE_USER_HEADER).unwrap();
        assert_eq!(id.name(), "alice");
    }

    #[test]
    fn blank_or_missing_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        assert!(CallerIdentity::from_headers(&headers, REMOTE_USER_HEADER).is_none());
        headers.insert(REMOTE_USER_HEADER, HeaderValue::from_static("   "));
        assert!(CallerIdentity::from_headers(&headers, REMOTE_USER_HEADER).is_none());
    }
}
