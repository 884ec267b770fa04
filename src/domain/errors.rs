//! Business-level error types, framework-agnostic.

use std::fmt;

#[derive(Debug)]
pub enum ServiceError {
    /// Resource not found
    NotFound(String),
    /// Validation error with message (bad input, insufficient stock,
    /// invalid status transition)
    Validation(String),
    /// Duplicate unique field (reference, telephone)
    Conflict(String),
    /// Database/persistence error
    Database(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotFound(msg) => write!(f, "{}", msg),
            ServiceError::Validation(msg) => write!(f, "{}", msg),
            ServiceError::Conflict(msg) => write!(f, "{}", msg),
            ServiceError::Database(msg) => write!(f, "Erreur base de données: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(e: sea_orm::DbErr) -> Self {
        ServiceError::Database(e.to_string())
    }
}
