//! Configuration error types.

use thiserror::Error;

/// Reasons a configuration is rejected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("native_app_uri `{0}` must be a custom-scheme URI such as `myapp://login-callback`")]
    NativeAppUri(String),

    #[error("web_fallback_url `{0}` must be an https:// URL")]
    WebFallbackUrl(String),

    #[error("native_agent_marker must not be empty")]
    EmptyMarker,

    #[error("route_path `{0}` must start with '/' and contain only literal path characters")]
    RoutePath(String),

    #[error("route_path `{0}` collides with a built-in endpoint")]
    RouteConflict(String),
}
