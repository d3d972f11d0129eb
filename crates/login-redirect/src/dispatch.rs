//! Redirect dispatch: classify a caller from its User-Agent and pick where to
//! send it.
//!
//! The dispatcher is immutable after construction and holds no per-request
//! state, so one instance is shared across all requests without locking.
//! Emitting the HTTP redirect is the server's job; this module only decides.

use std::borrow::Cow;
use std::fmt;

use http::header::USER_AGENT;
use http::HeaderMap;
use serde::Serialize;

use crate::config::RedirectConfig;

/// Kind of caller, as inferred from the request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientClass {
    /// The installed desktop application.
    NativeApp,
    /// Any other client, typically a browser.
    Web,
}

impl ClientClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientClass::NativeApp => "native-app",
            ClientClass::Web => "web",
        }
    }
}

impl fmt::Display for ClientClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a caller should be redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectTarget<'a> {
    pub class: ClientClass,
    pub location: &'a str,
}

impl<'a> RedirectTarget<'a> {
    /// Location with an inbound query string appended.
    ///
    /// The query goes before any `#fragment`, joined with `&` when the target
    /// already carries a query and `?` otherwise. An absent or empty query
    /// leaves the location untouched.
    pub fn location_with_query(&self, query: Option<&str>) -> Cow<'a, str> {
        let Some(query) = query.filter(|q| !q.is_empty()) else {
            return Cow::Borrowed(self.location);
        };

        let (base, fragment) = match self.location.find('#') {
            Some(idx) => self.location.split_at(idx),
            None => (self.location, ""),
        };
        let sep = if base.contains('?') { '&' } else { '?' };
        Cow::Owned(format!("{base}{sep}{query}{fragment}"))
    }
}

/// Decides between the native-app URI and the web fallback.
#[derive(Debug, Clone)]
pub struct RedirectDispatcher {
    native_app_uri: String,
    web_fallback_url: String,
    /// Stored lowercased when `ignore_case` is set.
    marker: String,
    ignore_case: bool,
}

impl RedirectDispatcher {
    /// Build from a configuration that has already passed
    /// [`RedirectConfig::validate`]. An empty marker would classify every
    /// caller as native.
    pub fn new(config: &RedirectConfig) -> Self {
        let marker = if config.ignore_case {
            config.native_agent_marker.to_ascii_lowercase()
        } else {
            config.native_agent_marker.clone()
        };

        Self {
            native_app_uri: config.native_app_uri.clone(),
            web_fallback_url: config.web_fallback_url.clone(),
            marker,
            ignore_case: config.ignore_case,
        }
    }

    /// Classify the caller from its `user-agent` header.
    ///
    /// A missing header counts as an empty user-agent. Only the first value is
    /// considered when the header is repeated, and non-UTF-8 bytes are decoded
    /// lossily before matching.
    pub fn classify(&self, headers: &HeaderMap) -> ClientClass {
        let user_agent = headers
            .get(USER_AGENT)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .unwrap_or_default();

        if self.is_native_agent(&user_agent) {
            ClientClass::NativeApp
        } else {
            ClientClass::Web
        }
    }

    /// Target for a given client class.
    pub fn target(&self, class: ClientClass) -> RedirectTarget<'_> {
        let location = match class {
            ClientClass::NativeApp => self.native_app_uri.as_str(),
            ClientClass::Web => self.web_fallback_url.as_str(),
        };
        RedirectTarget { class, location }
    }

    /// Classify the caller and return its redirect target. Total over all
    /// inputs: anything not recognized as the native app goes to the web.
    pub fn classify_and_redirect(&self, headers: &HeaderMap) -> RedirectTarget<'_> {
        self.target(self.classify(headers))
    }

    fn is_native_agent(&self, user_agent: &str) -> bool {
        if self.ignore_case {
            user_agent.to_ascii_lowercase().contains(&self.marker)
        } else {
            user_agent.contains(&self.marker)
        }
    }
}
