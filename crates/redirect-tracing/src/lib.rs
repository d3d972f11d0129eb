//! Reusable tracing setup for login-redirect: stderr logging with optional
//! OTLP export, and span macros.

pub mod config;
pub mod otlp;
pub mod spans;

pub use config::{LogFormat, OtlpProtocol, TracingConfig};
pub use otlp::{init_tracing, TracingGuard};
