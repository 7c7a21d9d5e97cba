// src/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

/// Failures reported by a document store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    Unavailable(String),
    Query(String),
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StoreError::Query(msg) => write!(f, "query failed: {}", msg),
            StoreError::Serialization(msg) => write!(f, "bad document: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Rejection carried through warp filters.
#[derive(Debug)]
pub struct CustomError {
    pub status: StatusCode,
    pub message: String,
}

impl CustomError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        CustomError {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        CustomError::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CustomError::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        CustomError::new(StatusCode::BAD_REQUEST, message)
    }
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CustomError {}

impl Reject for CustomError {}
