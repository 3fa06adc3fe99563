//! Request Pipeline
//!
//! Per-request state and the ordered interceptor stages that run before a
//! request reaches the dispatcher. Each stage either hands the (possibly
//! updated) state to the next one or answers the request itself.

use std::fmt;

use axum::{
    http::{request::Parts, Method},
    response::{IntoResponse, Response},
};

use crate::error::{Problem, ProblemKind};
use crate::logging::PLACEHOLDER_REQUEST_ID;

/// Header carrying the caller's correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// == Key ==
/// A validated, percent-decoded, single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Request Context ==
/// Typed state threaded through the pipeline and into the dispatcher.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Raw request path, used as the `instance` of any problem
    pub path: String,
    pub query: Option<String>,
    pub request_id: String,
    /// Set by [`KeyParser`]
    pub key: Option<Key>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|id| !id.is_empty())
            .unwrap_or(PLACEHOLDER_REQUEST_ID)
            .to_string();

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            request_id,
            key: None,
        }
    }
}

// == Stages ==
/// Outcome of one interceptor stage.
pub enum Flow {
    Continue(RequestContext),
    Respond(Response),
}

pub trait Interceptor: Send + Sync {
    fn intercept(&self, ctx: RequestContext) -> Flow;
}

/// Interceptor stages, run in insertion order until one responds.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Interceptor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: impl Interceptor + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn run(&self, mut ctx: RequestContext) -> Flow {
        for stage in &self.stages {
            match stage.intercept(ctx) {
                Flow::Continue(next) => ctx = next,
                respond => return respond,
            }
        }
        Flow::Continue(ctx)
    }
}

// == Key Parser ==
/// Extracts the key from `<base_uri><key>`.
///
/// Missing key, extra segments and paths outside the base URI are 404; a
/// query string (or a path that does not decode to UTF-8) is 400.
#[derive(Debug, Clone)]
pub struct KeyParser {
    base_uri: String,
}

impl KeyParser {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
        }
    }

    pub fn parse(&self, path: &str, query: Option<&str>) -> Result<Key, ProblemKind> {
        let decoded = urlencoding::decode(path).map_err(|_| ProblemKind::BadRequest)?;

        let rest = match decoded.strip_prefix(self.base_uri.as_str()) {
            Some(rest) if !rest.is_empty() => rest,
            _ => return Err(ProblemKind::NotFound),
        };

        if query.is_some_and(|q| !q.is_empty()) {
            return Err(ProblemKind::BadRequest);
        }

        let mut segments = rest.split('/');
        match (segments.next(), segments.next()) {
            (Some(key), None) if !key.is_empty() => Ok(Key(key.to_string())),
            _ => Err(ProblemKind::NotFound),
        }
    }
}

impl Interceptor for KeyParser {
    fn intercept(&self, mut ctx: RequestContext) -> Flow {
        match self.parse(&ctx.path, ctx.query.as_deref()) {
            Ok(key) => {
                ctx.key = Some(key);
                Flow::Continue(ctx)
            }
            Err(kind) => Flow::Respond(Problem::new(kind, ctx.path).into_response()),
        }
    }
}
