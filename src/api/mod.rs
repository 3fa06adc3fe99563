//! API Module
//!
//! HTTP surface of the service.
//!
//! # Endpoints
//! - `GET <base_uri><key>` - Read a value
//! - `POST <base_uri><key>` - Store the request body under a key
//! - `DELETE <base_uri><key>` - Remove a key
//! - `GET /healthz` - Readiness probe

pub mod handlers;
pub mod pipeline;
pub mod routes;


pub use handlers::{dispatch, healthz, AppState};
pub use pipeline::{Flow, Interceptor, Key, KeyParser, Pipeline, RequestContext};
pub use routes::create_router;
