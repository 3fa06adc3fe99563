//! Error types for the key/value front end
//!
//! `Problem` is the structured (RFC 7807) payload returned for every non-2xx
//! response. `StorageError` is what the storage layer hands back to handlers.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Media type of a serialized `Problem`.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

const ENCODING_FALLBACK: &str = "UNABLE TO SERIALIZE ERROR RESPONSE; THIS IS A BUG!\n";

// == Problem Kinds ==
/// The fixed set of problems this service can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    BadRequest,
    /// Reserved; no request path produces it.
    Unauthorized,
    NotFound,
    InternalServerError,
}

impl ProblemKind {
    /// HTTP status code for this kind.
    pub fn status(self) -> StatusCode {
        match self {
            ProblemKind::BadRequest => StatusCode::BAD_REQUEST,
            ProblemKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ProblemKind::NotFound => StatusCode::NOT_FOUND,
            ProblemKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable identifier URI.
    pub fn type_uri(self) -> &'static str {
        match self {
            ProblemKind::BadRequest => "https://kvfront.dev/errors/bad_request",
            ProblemKind::Unauthorized => "https://kvfront.dev/errors/not_authorized",
            ProblemKind::NotFound => "https://kvfront.dev/errors/not_found",
            ProblemKind::InternalServerError => "https://kvfront.dev/errors/server_error",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ProblemKind::BadRequest => "Bad request",
            ProblemKind::Unauthorized => "Not authorized",
            ProblemKind::NotFound => "Not found",
            ProblemKind::InternalServerError => "Internal server error",
        }
    }

    /// Generic detail text. Concrete causes go to the log, never here.
    pub fn detail(self) -> &'static str {
        match self {
            ProblemKind::BadRequest => "The request was incorrect or malformed",
            ProblemKind::Unauthorized => "Unable to authorize request",
            ProblemKind::NotFound => "The value you requested was not found",
            ProblemKind::InternalServerError => "The server encountered an error with your request",
        }
    }
}

// == Problem ==
/// A structured error payload bound to the request path it occurred on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    #[serde(skip)]
    pub kind: ProblemKind,
    #[serde(rename = "type")]
    pub type_uri: &'static str,
    pub title: &'static str,
    pub detail: &'static str,
    pub instance: String,
}

impl Problem {
    /// Creates a problem of the given kind for the request path `instance`.
    pub fn new(kind: ProblemKind, instance: impl Into<String>) -> Self {
        Self {
            kind,
            type_uri: kind.type_uri(),
            title: kind.title(),
            detail: kind.detail(),
            instance: instance.into(),
        }
    }

    pub fn bad_request(instance: impl Into<String>) -> Self {
        Self::new(ProblemKind::BadRequest, instance)
    }

    pub fn unauthorized(instance: impl Into<String>) -> Self {
        Self::new(ProblemKind::Unauthorized, instance)
    }

    pub fn not_found(instance: impl Into<String>) -> Self {
        Self::new(ProblemKind::NotFound, instance)
    }

    pub fn internal_server_error(instance: impl Into<String>) -> Self {
        Self::new(ProblemKind::InternalServerError, instance)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status();
        let (content_type, body) = match serde_json::to_string_pretty(&self) {
            Ok(json) => (PROBLEM_CONTENT_TYPE, json + "\n"),
            Err(_) => ("text/plain; charset=utf-8", ENCODING_FALLBACK.to_string()),
        };

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        response
    }
}

// == Storage Error ==
/// Failures surfaced by a [`Store`](crate::storage::Store).
#[derive(Error, Debug)]
pub enum StorageError {
    /// Key absent or expired
    #[error("key not found: {0}")]
    NotFound(String),

    /// The session was released by `close()`
    #[error("storage session is closed")]
    Closed,

    /// Any other backing store failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Convenience Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
