//! Span builder helpers for login-redirect instrumentation.

/// Create a tracing span for one redirect decision.
///
/// Usage: `let span = redirect_request_span!(request_id); span.in_scope(|| ...)`
///
/// Fields recorded once the dispatcher has decided:
/// - `client_class`: `native-app` or `web`
/// - `location`: the emitted `Location` header value
#[macro_export]
macro_rules! redirect_request_span {
    ($request_id:expr) => {
        tracing::info_span!(
            "redirect_request",
            request_id = %$request_id,
            client_class = tracing::field::Empty,
            location = tracing::field::Empty,
        )
    };
}
