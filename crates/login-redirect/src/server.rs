//! Axum HTTP server: router, listener, graceful shutdown.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;

use crate::config::{AppConfig, HEALTH_PATH, STATS_PATH};
use crate::dispatch::RedirectDispatcher;
use crate::request_id::{self, REQUEST_ID_HEADER};
use crate::stats::RedirectStats;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: RedirectDispatcher,
    pub forward_query: bool,
    pub stats: RedirectStats,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            dispatcher: RedirectDispatcher::new(&config.redirect),
            forward_query: config.redirect.forward_query,
            stats: RedirectStats::new(),
        }
    }
}

/// Assemble the router with the redirect endpoint mounted on `route_path`.
pub fn router(state: AppState, route_path: &str) -> Router {
    Router::new()
        .route(route_path, any(handle_redirect))
        .route(HEALTH_PATH, get(handle_health))
        .route(STATS_PATH, get(handle_get_stats))
        .fallback(handle_fallback)
        .with_state(Arc::new(state))
}

/// Build and run the HTTP server.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let listen_addr = config.server.listen_address.clone();
    let app = router(AppState::from_config(&config), &config.redirect.route_path);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(
        address = %listen_addr,
        route = %config.redirect.route_path,
        "login-redirect listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("login-redirect shut down gracefully");
    Ok(())
}

/// Redirect endpoint, any method.
///
/// Answers `302 Found` with `Location` set to the native-app URI or the web
/// fallback, chosen by the dispatcher from the request's User-Agent.
async fn handle_redirect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let request_id = request_id::resolve(&headers);
    let span = redirect_tracing::redirect_request_span!(&request_id);

    let mut response = span.in_scope(|| redirect_response(&state, &headers, uri.query()));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn redirect_response(state: &AppState, headers: &HeaderMap, query: Option<&str>) -> Response {
    let target = state.dispatcher.classify_and_redirect(headers);
    let query = if state.forward_query { query } else { None };
    let location = target.location_with_query(query);

    let span = tracing::Span::current();
    span.record("client_class", target.class.as_str());
    span.record("location", &*location);

    let location = match HeaderValue::from_str(&location) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Redirect target is not a valid header value");
            return (StatusCode::INTERNAL_SERVER_ERROR, "invalid redirect target").into_response();
        }
    };

    state.stats.record(target.class);
    tracing::debug!(
        user_agent = ?headers.get(axum::http::header::USER_AGENT),
        "Redirecting caller"
    );

    (
        StatusCode::FOUND,
        [
            (LOCATION, location),
            (CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
    )
        .into_response()
}

/// GET /api/stats: current redirect counters.
async fn handle_get_stats(State(state): State<Arc<AppState>>) -> Response {
    axum::Json(state.stats.snapshot()).into_response()
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn handle_fallback(uri: Uri) -> Response {
    tracing::debug!(path = %uri.path(), "No route for path");
    (StatusCode::NOT_FOUND, "not found").into_response()
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, draining connections...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::{RedirectConfig, RESERVED_PATHS};

    const NATIVE: &str = "sollylabs_flutter://login-callback";
    const WEB: &str = "https://sollylabs-flutter.web.app/login-callback";
    const ROUTE: &str = "/redirectToDesktopOrWeb";

    fn app_with(redirect: RedirectConfig) -> Router {
        let config = AppConfig {
            redirect,
            ..AppConfig::default()
        };
        router(AppState::from_config(&config), &config.redirect.route_path)
    }

    fn app() -> Router {
        app_with(RedirectConfig::default())
    }

    fn get(uri: &str, user_agent: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(ua) = user_agent {
            builder = builder.header("user-agent", ua);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_desktop_app_redirected_to_scheme() {
        let response = app()
            .oneshot(get(ROUTE, Some("YourDesktopAppIdentifier/1.0")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), NATIVE);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn test_browser_redirected_to_web() {
        let response = app()
            .oneshot(get(ROUTE, Some("Mozilla/5.0 (Windows NT 10.0)")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), WEB);
    }

    #[tokio::test]
    async fn test_missing_agent_redirected_to_web() {
        let response = app().oneshot(get(ROUTE, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), WEB);
    }

    #[tokio::test]
    async fn test_post_also_redirects() {
        let request = Request::builder()
            .method("POST")
            .uri(ROUTE)
            .header("user-agent", "YourDesktopAppIdentifier/1.0")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), NATIVE);
    }

    #[tokio::test]
    async fn test_request_id_echoed_or_generated() {
        let request = Request::builder()
            .uri(ROUTE)
            .header(REQUEST_ID_HEADER, "edge-42")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "edge-42");

        let response = app().oneshot(get(ROUTE, None)).await.unwrap();
        let generated = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
    }

    #[tokio::test]
    async fn test_query_dropped_by_default() {
        let response = app()
            .oneshot(get("/redirectToDesktopOrWeb?code=abc", Some("Mozilla/5.0")))
            .await
            .unwrap();
        assert_eq!(location(&response), WEB);
    }

    #[tokio::test]
    async fn test_query_forwarded_when_enabled() {
        let app = app_with(RedirectConfig {
            forward_query: true,
            ..RedirectConfig::default()
        });

        let response = app
            .clone()
            .oneshot(get("/redirectToDesktopOrWeb?code=abc&state=xyz", Some("YourDesktopAppIdentifier/1.0")))
            .await
            .unwrap();
        assert_eq!(location(&response), format!("{NATIVE}?code=abc&state=xyz"));

        let response = app.oneshot(get(ROUTE, Some("Mozilla/5.0"))).await.unwrap();
        assert_eq!(location(&response), WEB);
    }

    #[tokio::test]
    async fn test_query_forwarded_before_fragment() {
        let app = app_with(RedirectConfig {
            web_fallback_url: "https://app.example/#/login-callback".to_string(),
            forward_query: true,
            ..RedirectConfig::default()
        });

        let response = app
            .oneshot(get("/redirectToDesktopOrWeb?code=abc", Some("Mozilla/5.0")))
            .await
            .unwrap();
        assert_eq!(location(&response), "https://app.example/?code=abc#/login-callback");
    }

    #[test]
    fn test_every_accepted_route_path_builds_a_router() {
        for path in ["/", "/login-callback", "/auth/v1/desktop_or.web", "/cb;v=2"] {
            let redirect = RedirectConfig {
                route_path: path.to_string(),
                ..RedirectConfig::default()
            };
            assert!(redirect.validate().is_ok());
            let _ = app_with(redirect);
        }
    }

    #[tokio::test]
    async fn test_reserved_paths_are_served() {
        for path in RESERVED_PATHS {
            let response = app().oneshot(get(path, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn test_custom_route_path() {
        let app = app_with(RedirectConfig {
            route_path: "/login-callback".to_string(),
            ..RedirectConfig::default()
        });

        let response = app
            .clone()
            .oneshot(get("/login-callback", Some("YourDesktopAppIdentifier/1.0")))
            .await
            .unwrap();
        assert_eq!(location(&response), NATIVE);

        let response = app.oneshot(get(ROUTE, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let response = app().oneshot(get("/elsewhere", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats_count_each_class() {
        let app = app();
        for ua in [Some("YourDesktopAppIdentifier/1.0"), Some("Mozilla/5.0"), None] {
            let response = app.clone().oneshot(get(ROUTE, ua)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FOUND);
        }

        let response = app.oneshot(get("/api/stats", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "total_redirects": 3, "native_app": 1, "web": 2 })
        );
    }
}
