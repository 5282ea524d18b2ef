//! Logging and distributed tracing for promptgate.
//!
//! Sets up the `tracing` subscriber (pretty or JSON logs, optional OTLP
//! export), provides the spans used by the gateway and workers, and carries
//! W3C trace context from a submitting request to the job that serves it.

pub mod context;
pub mod spans;
pub mod tracer;

pub use context::TraceContext;
pub use spans::{cache_span, gateway_span, job_span};
pub use tracer::{LogFormat, OtlpConfig, TracerError, TracingConfig, init_tracer, shutdown_tracer};
