//! API Handlers
//!
//! The method dispatcher for `<base_uri><key>` and the health endpoint.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};

use super::pipeline::{Flow, Key, KeyParser, Pipeline, RequestContext};
use crate::config::Config;
use crate::error::{Problem, StorageError};
use crate::logging::{Logger, ScopedLogger};
use crate::storage::Store;

const OCTET_STREAM: &str = "application/octet-stream";

/// Largest value accepted by POST, in bytes.
///
/// Matches the default half-commitlog-segment mutation limit of Cassandra.
pub const MAX_VALUE_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across all handlers.
///
/// Built once at startup; every field is read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub logger: Arc<Logger>,
    pub pipeline: Arc<Pipeline>,
    /// TTL applied to every write, in seconds
    pub default_ttl: u32,
}

impl AppState {
    /// Creates state whose pipeline extracts keys below `base_uri`.
    pub fn new(
        store: Arc<dyn Store>,
        logger: Arc<Logger>,
        base_uri: &str,
        default_ttl: u32,
    ) -> Self {
        let pipeline = Pipeline::new().with(KeyParser::new(base_uri));
        Self {
            store,
            logger,
            pipeline: Arc::new(pipeline),
            default_ttl,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn Store>, logger: Arc<Logger>) -> Self {
        Self::new(store, logger, &config.base_uri, config.default_ttl_secs())
    }
}

/// Fallback handler: runs the pipeline, then dispatches on the HTTP method.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let ctx = match state.pipeline.run(RequestContext::from_parts(&parts)) {
        Flow::Continue(ctx) => ctx,
        Flow::Respond(response) => return response,
    };
    let Some(key) = ctx.key.as_ref() else {
        return Problem::not_found(ctx.path.as_str()).into_response();
    };
    let log = state.logger.scoped(&ctx.request_id);

    match ctx.method {
        Method::GET => get_value(&state, &ctx, key, log).await,
        Method::POST => post_value(&state, &ctx, key, body, log).await,
        Method::DELETE => delete_value(&state, &ctx, key, log).await,
        Method::PUT => {
            log.debug(format_args!("PUT is not supported; use POST"));
            Problem::bad_request(ctx.path.as_str()).into_response()
        }
        ref other => {
            log.error(format_args!("Unsupported HTTP method used: ({})", other));
            Problem::bad_request(ctx.path.as_str()).into_response()
        }
    }
}

async fn get_value(
    state: &AppState,
    ctx: &RequestContext,
    key: &Key,
    log: ScopedLogger<'_>,
) -> Response {
    match state.store.get(key.as_str()).await {
        Ok(datum) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, OCTET_STREAM)],
            datum.value,
        )
            .into_response(),
        Err(StorageError::NotFound(_)) => {
            log.debug(format_args!("Key not found: {}", key));
            Problem::not_found(ctx.path.as_str()).into_response()
        }
        Err(err) => {
            log.error(format_args!("Error reading from storage ({})", err));
            Problem::internal_server_error(ctx.path.as_str()).into_response()
        }
    }
}

async fn post_value(
    state: &AppState,
    ctx: &RequestContext,
    key: &Key,
    body: Body,
    log: ScopedLogger<'_>,
) -> Response {
    let value = match to_bytes(body, MAX_VALUE_BYTES).await {
        Ok(value) => value,
        Err(err) => {
            log.debug(format_args!("Error reading body of POST request: ({})", err));
            return Problem::internal_server_error(ctx.path.as_str()).into_response();
        }
    };

    if value.is_empty() {
        log.error(format_args!("Request body is empty"));
        return Problem::bad_request(ctx.path.as_str()).into_response();
    }

    if let Err(err) = state.store.set(key.as_str(), &value, state.default_ttl).await {
        log.error(format_args!("Error writing to storage ({})", err));
        return Problem::internal_server_error(ctx.path.as_str()).into_response();
    }

    (StatusCode::CREATED, [(header::CONTENT_TYPE, OCTET_STREAM)]).into_response()
}

async fn delete_value(
    state: &AppState,
    ctx: &RequestContext,
    key: &Key,
    log: ScopedLogger<'_>,
) -> Response {
    if let Err(err) = state.store.delete(key.as_str()).await {
        log.error(format_args!("Error deleting in storage ({})", err));
        return Problem::internal_server_error(ctx.path.as_str()).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Handler for GET /healthz: an empty 200 with a JSON content type.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")])
}
