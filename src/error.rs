//! Error taxonomy for user-facing blog operations.
//!
//! Store plumbing returns `anyhow::Result`; the services translate that into
//! `BlogError` so callers (CLI, HTTP handlers) can tell a bad request apart
//! from a missing row or a backend failure.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlogError {
    /// Rejected before any store call (blank comment, anonymous commenter, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The actor is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Network or backend failure in the content store.
    #[error("Content store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl BlogError {
    pub fn validation(message: impl Into<String>) -> Self {
        BlogError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BlogError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        BlogError::Forbidden(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BlogError>;
