use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use serde::Serialize;
use serde_json::json;
use sqlx::{error::ErrorKind, Error as SqlxError};
use std::env::VarError;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// Failures raised while writing to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Error in statement: {statement}: {source}")]
    Statement {
        statement: String,
        #[source]
        source: SqlxError,
    },

    #[error("no stock of hardware {hardware} holds {count} item(s)")]
    StockUnavailable { hardware: i64, count: i64 },

    #[error("stock {stock} does not hold hardware {hardware} with {count} item(s)")]
    StockMismatch { stock: i64, hardware: i64, count: i64 },

    #[error("Transaction error: {0}")]
    Transaction(#[from] SqlxError),
}

impl StoreError {
    pub fn statement(statement: impl Into<String>, source: SqlxError) -> Self {
        StoreError::Statement {
            statement: statement.into(),
            source,
        }
    }

    /// Whether the store refused the write because of a schema constraint.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Statement {
                source: SqlxError::Database(e),
                ..
            } => matches!(
                e.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Incorrect username or password")]
    Unauthorized,

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal server error")]
    InternalServerError,

    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] VarError),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] SqlxError),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

/// One entry of the `detail` list in an error body.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ErrorDetail {
    fn body(msg: impl Into<String>, kind: &'static str) -> Self {
        ErrorDetail {
            loc: vec!["body".to_owned()],
            msg: msg.into(),
            kind,
        }
    }
}

impl AppError {
    fn details(&self) -> Vec<ErrorDetail> {
        match self {
            AppError::Validation(errors) => errors
                .iter()
                .map(|e| {
                    let mut loc = vec!["body".to_owned()];
                    loc.extend(e.field.split('.').map(str::to_owned));
                    ErrorDetail {
                        loc,
                        msg: e.message.clone(),
                        kind: "value_error",
                    }
                })
                .collect(),
            AppError::InvalidBody(msg) => vec![ErrorDetail::body(msg.clone(), "parse_error")],
            AppError::Store(
                e @ (StoreError::StockUnavailable { .. } | StoreError::StockMismatch { .. }),
            ) => vec![ErrorDetail::body(e.to_string(), "stock_error")],
            AppError::Store(e) => vec![ErrorDetail::body(e.to_string(), "database_error")],
            _ => Vec::new(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(StoreError::StockUnavailable { .. })
            | AppError::Store(StoreError::StockMismatch { .. }) => StatusCode::BAD_REQUEST,
            AppError::Store(e) if e.is_constraint_violation() => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::EnvVarError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SqlxError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MigrateError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        match self {
            AppError::Unauthorized => response
                .insert_header((header::WWW_AUTHENTICATE, "Basic"))
                .json(json!({ "detail": self.to_string() })),
            AppError::Validation(_) | AppError::InvalidBody(_) | AppError::Store(_)
                if self.status_code().is_client_error() =>
            {
                response.json(json!({ "detail": self.details() }))
            }
            AppError::NotFound => response.json(json!({ "detail": "Not Found" })),
            _ => response.json(json!({ "detail": "Internal server error" })),
        }
    }
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
    }
}
