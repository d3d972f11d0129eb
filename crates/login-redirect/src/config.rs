//! Configuration types and loading logic.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use http::HeaderValue;
use redirect_tracing::TracingConfig;
use serde::Deserialize;

use crate::error::ConfigError;

/// Health check endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Redirect counters endpoint.
pub const STATS_PATH: &str = "/api/stats";

/// Paths served by the router regardless of configuration.
pub const RESERVED_PATHS: &[&str] = &[HEALTH_PATH, STATS_PATH];

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redirect: RedirectConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// Redirect targets and native client detection.
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectConfig {
    /// Path the redirect endpoint is mounted on.
    #[serde(default = "default_route_path")]
    pub route_path: String,

    /// Custom-scheme URI that hands control to the installed desktop app.
    #[serde(default = "default_native_app_uri")]
    pub native_app_uri: String,

    /// HTTPS URL used for every caller that is not the desktop app.
    #[serde(default = "default_web_fallback_url")]
    pub web_fallback_url: String,

    /// Substring of the desktop app's User-Agent that identifies it.
    #[serde(default = "default_native_agent_marker")]
    pub native_agent_marker: String,

    /// Match the marker ignoring ASCII case.
    #[serde(default)]
    pub ignore_case: bool,

    /// Append the inbound query string to the redirect target.
    #[serde(default)]
    pub forward_query: bool,
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_route_path() -> String {
    "/redirectToDesktopOrWeb".to_string()
}

fn default_native_app_uri() -> String {
    "sollylabs_flutter://login-callback".to_string()
}

fn default_web_fallback_url() -> String {
    "https://sollylabs-flutter.web.app/login-callback".to_string()
}

fn default_native_agent_marker() -> String {
    "YourDesktopAppIdentifier".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            route_path: default_route_path(),
            native_app_uri: default_native_app_uri(),
            web_fallback_url: default_web_fallback_url(),
            native_agent_marker: default_native_agent_marker(),
            ignore_case: false,
            forward_query: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LOGIN_REDIRECT_ prefix, __ for nesting)
    /// 2. TOML config file (optional; a missing file means all defaults)
    /// 3. Defaults
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(config_path))
                .merge(Env::prefixed("LOGIN_REDIRECT_").split("__")),
        )
    }

    /// Extract and validate from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract()?;
        config.redirect.validate()?;
        Ok(config)
    }
}

impl RedirectConfig {
    /// Reject values that would make the dispatcher misbehave or produce an
    /// unusable `Location` header.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_literal_route(&self.route_path) {
            return Err(ConfigError::RoutePath(self.route_path.clone()));
        }
        if RESERVED_PATHS.contains(&self.route_path.as_str()) {
            return Err(ConfigError::RouteConflict(self.route_path.clone()));
        }
        if !is_native_app_uri(&self.native_app_uri) {
            return Err(ConfigError::NativeAppUri(self.native_app_uri.clone()));
        }
        if !is_web_url(&self.web_fallback_url) {
            return Err(ConfigError::WebFallbackUrl(self.web_fallback_url.clone()));
        }
        if self.native_agent_marker.is_empty() {
            return Err(ConfigError::EmptyMarker);
        }
        Ok(())
    }
}

/// Absolute path made of literal characters only.
///
/// The router treats `{...}`, `:name` and `*rest` as captures and panics on
/// malformed ones, so none of `{ } : *` are accepted.
fn is_literal_route(path: &str) -> bool {
    const PUNCTUATION: &str = "/-._~!$&'()+,;=@%";
    path.starts_with('/')
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PUNCTUATION.contains(c))
}

/// `scheme://rest` with a non-HTTP scheme and a header-safe remainder.
///
/// Underscores are accepted in the scheme since desktop toolkits commonly
/// register schemes such as `my_app`.
fn is_native_app_uri(uri: &str) -> bool {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let scheme_ok = starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_'));
    let is_http = scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https");

    scheme_ok && !is_http && !rest.is_empty() && HeaderValue::from_str(uri).is_ok()
}

fn is_web_url(url: &str) -> bool {
    url.strip_prefix("https://").is_some_and(|rest| !rest.is_empty())
        && HeaderValue::from_str(url).is_ok()
}
