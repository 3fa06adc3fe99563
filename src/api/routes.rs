//! API Routes
//!
//! Configures the Axum router.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{dispatch, healthz, AppState};

/// Creates the main router.
///
/// # Endpoints
/// - `GET /healthz` - Readiness probe
/// - `GET|POST|DELETE <base_uri><key>` - Key/value operations
///
/// Every other request, including non-GET methods on `/healthz`, falls through
/// to the dispatcher, whose key parser answers with a 404 problem.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz).fallback(dispatch))
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Level, Logger};
    use crate::storage::MemoryStore;
    use crate::storage::Store;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        create_app_with_base("/v1/").0
    }

    fn create_app_with_base(base_uri: &str) -> (Router, Arc<MemoryStore>) {
        let logger = Arc::new(Logger::new(std::io::sink(), "routes_test", Level::Info));
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), logger, base_uri, 0);
        (create_router(state), store)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: &'static str) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = send(&app, "GET", "/healthz", "").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_health_path_other_methods_are_problems() {
        let app = create_test_app();

        for method in ["POST", "DELETE"] {
            let response = send(&app, method, "/healthz", "x").await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", method);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/problem+json"
            );
        }
    }

    #[tokio::test]
    async fn test_healthz_key_under_root_base() {
        let (app, store) = create_app_with_base("/");

        let response = send(&app, "POST", "/healthz", "ok").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.get("healthz").await.unwrap().value, b"ok");

        let response = send(&app, "DELETE", "/healthz", "").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unrelated_path_is_not_found() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
