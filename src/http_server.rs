//! HTTP server for the gateway
//!
//! Every `/api/v1/mongodb/*` route answers 200 with an [`Envelope`] body. The
//! body is read as raw bytes so that undecodable JSON still yields an
//! envelope instead of an extractor rejection. Request bodies are unbounded
//! unless a limit is configured; a body over the limit is answered with a
//! malformed-parameters envelope.

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post, MethodRouter},
    Router,
};
use http::{header, HeaderName, HeaderValue, Method, StatusCode};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::gateway::{Envelope, Gateway, OperationKind, Outcome};

/// Route prefix for document operations
pub const API_PREFIX: &str = "/api/v1/mongodb";

/// Build the application router.
///
/// `max_body_bytes` caps request bodies; `None` accepts any size.
pub fn build_router(gateway: Arc<Gateway>, max_body_bytes: Option<usize>) -> Router {
    let mut api = Router::new();
    for kind in OperationKind::ALL {
        api = api.route(&format!("/{}", kind.path()), operation_route(kind));
        if let Some(alias) = kind.alias() {
            api = api.route(&format!("/{}", alias), operation_route(kind));
        }
    }

    Router::new()
        .route("/", get(liveness))
        .nest(API_PREFIX, api)
        .with_state(gateway)
        .layer(body_limit(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(middleware::from_fn(preflight_no_content))
}

fn body_limit(max_body_bytes: Option<usize>) -> DefaultBodyLimit {
    match max_body_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    }
}

fn operation_route(kind: OperationKind) -> MethodRouter<Arc<Gateway>> {
    post(
        move |State(gateway): State<Arc<Gateway>>,
              body: Result<Bytes, BytesRejection>| async move {
            match body {
                Ok(body) => Json::<Envelope>(gateway.handle(kind, &body).await),
                Err(e) => {
                    warn!(operation = %kind, error = %e, "Failed to read request body");
                    Json(Envelope::failure(Outcome::MalformedParameters))
                }
            }
        },
    )
}

async fn liveness() -> Json<&'static str> {
    Json("ok")
}

/// Permissive CORS: any origin (mirrored so credentials are allowed)
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("accesstoken"),
            HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
            HeaderName::from_static("token"),
        ])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            header::CONTENT_TYPE,
        ])
}

/// Answer every OPTIONS request with an empty 204, keeping the CORS headers
async fn preflight_no_content(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }

    let inner = next.run(request).await;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    for (name, value) in inner.headers() {
        if name.as_str().starts_with("access-control-") || name == header::VARY {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    response.into_response()
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!("Starting HTTP server on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(Arc::new(Gateway::new(Arc::new(MemoryStore::new()))), None)
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = app()
            .oneshot(http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"\"ok\"");
    }

    #[tokio::test]
    async fn test_preflight_is_no_content() {
        let response = app()
            .oneshot(
                http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/mongodb/find")
                    .header(header::ORIGIN, "http://example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://example.com"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_every_route_is_registered() {
        let paths = OperationKind::ALL
            .iter()
            .map(|k| k.path())
            .chain(OperationKind::ALL.iter().filter_map(|k| k.alias()));

        for path in paths {
            let response = app()
                .oneshot(
                    http::Request::builder()
                        .method(Method::POST)
                        .uri(format!("{}/{}", API_PREFIX, path))
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "route {path}");
        }
    }

    #[tokio::test]
    async fn test_bare_options_is_no_content() {
        // no Access-Control-Request-Method: not a CORS preflight, the route itself answers
        let response = app()
            .oneshot(
                http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/mongodb/deleteMany")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "http://example.com"
        );
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "0");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_cors_headers_on_ordinary_requests() {
        let requests = [
            http::Request::builder()
                .method(Method::POST)
                .uri("/api/v1/mongodb/find")
                .header(header::ORIGIN, "http://app.example.com")
                .body(Body::from(r#"{"database":"d","collection":"c","filter":{}}"#))
                .unwrap(),
            http::Request::builder()
                .uri("/")
                .header(header::ORIGIN, "http://app.example.com")
                .body(Body::empty())
                .unwrap(),
        ];

        for request in requests {
            let response = app().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let headers = response.headers();
            assert_eq!(
                headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
                "http://app.example.com"
            );
            assert_eq!(
                headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
                "true"
            );
            let exposed = headers
                .get(header::ACCESS_CONTROL_EXPOSE_HEADERS)
                .unwrap()
                .to_str()
                .unwrap()
                .to_ascii_lowercase();
            assert!(exposed.contains("content-type"));
            assert!(exposed.contains("content-length"));
        }
    }

    #[tokio::test]
    async fn test_body_over_limit_gets_envelope() {
        let app = build_router(
            Arc::new(Gateway::new(Arc::new(MemoryStore::new()))),
            Some(64),
        );
        let body = format!(
            r#"{{"database":"d","collection":"c","data":{{"text":"{}"}}}}"#,
            "x".repeat(256)
        );

        let response = app
            .oneshot(
                http::Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/mongodb/insertOne")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let envelope: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope, Envelope::failure(Outcome::MalformedParameters));
    }
}
