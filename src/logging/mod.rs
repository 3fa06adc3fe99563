//! Logging Module
//!
//! Leveled, JSON-line, request-scoped logging for the service.

mod level;
mod logger;

pub use level::{Level, ParseLevelError};
pub use logger::{LogRecord, Logger, ScopedLogger};

/// Request id used when a request carries no `X-Request-ID` header.
pub const PLACEHOLDER_REQUEST_ID: &str = "00000000-0000-0000-0000-000000000000";

#[cfg(test)]
pub(crate) use logger::testing;
