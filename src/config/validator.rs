//! Startup validation of [`ServiceConfig`].

use crate::config::ServiceConfig;
use crate::error::ConfigError;
use axum::http::HeaderName;

pub fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.store.max_connections == 0 {
        return Err(invalid("DOCSTORE_MAX_CONNECTIONS", "0", "must be at least 1"));
    }
    if config.http.max_upload_bytes == 0 {
        return Err(invalid("MAX_UPLOAD_BYTES", "0", "must be positive"));
    }
    if HeaderName::from_bytes(config.http.auth_header.as_bytes()).is_err() {
        return Err(invalid("AUTH_USER_HEADER", &config.http.auth_header, "not a valid header name"));
    }
    if config.policy.require_prefix && config.policy.tenant_prefix.is_empty() {
        return Err(invalid("TENANT_DB_PREFIX", "", "required when REQUIRE_TENANT_PREFIX is set"));
    }
    if !is_identifier(&config.roles.schema) {
        return Err(invalid("ROLEDB_SCHEMA", &config.roles.schema, "expected letters, digits or _"));
    }
    if config.http.link_field.contains('.') || config.http.link_field.starts_with('$') {
        return Err(invalid("GRIDFS_LINK_FIELD", &config.http.link_field, "must be a plain field name"));
    }
    Ok(())
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
