//! Typed errors and HTTP mapping.

use crate::document::ObjectIdError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue { key: &'static str, value: String, reason: String },
    #[error("unknown privilege '{0}': not registered in the privilege table")]
    UnknownPrivilege(String),
    #[error("privilege table: {0}")]
    Privileges(String),
    #[error("config load: {0}")]
    Load(String),
}

/// Malformed client input: filter syntax, request bodies, identifiers.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),
    #[error(transparent)]
    ObjectId(#[from] ObjectIdError),
    #[error("payload _id '{payload}' does not match path id '{path}'")]
    IdentifierMismatch { path: String, payload: String },
}

impl ParseError {
    pub fn json(context: &'static str, source: serde_json::Error) -> Self {
        ParseError::Json { context, source }
    }
}

/// Failures raised by the document store, large-object store or role directory.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unsupported query operator: {0}")]
    UnsupportedOperator(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database '{0}' is not accessible through this service")]
    AddressPolicy(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("user '{user}' lacks privilege '{privilege}' for '{subject}'")]
    Forbidden { user: String, privilege: String, subject: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("payload rejected: {0}")]
    Payload(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AddressPolicy(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Config(_) | AppError::Parse(_) | AppError::Store(_) | AppError::Payload(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::AddressPolicy(_) => "address_policy",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden { .. } => "forbidden",
            AppError::Parse(_) => "parse_error",
            AppError::Store(_) => "store_error",
            AppError::Payload(_) => "payload_rejected",
            AppError::NotFound(_) => "not_found",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Parse(ParseError::Json { source, .. }) => Some(serde_json::json!({
                "line": source.line(),
                "column": source.column(),
            })),
            AppError::Parse(ParseError::IdentifierMismatch { path, payload }) => Some(serde_json::json!({
                "path_id": path,
                "payload_id": payload,
            })),
            AppError::Forbidden { privilege, subject, .. } => Some(serde_json::json!({
                "privilege": privilege,
                "subject": subject,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Store details stay in the server log.
        let message = match &self {
            AppError::Store(_) => "store operation failed".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}
