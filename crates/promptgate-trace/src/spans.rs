//! Span creation for gateway and worker operations.

use crate::context::TraceContext;
use tracing::{Level, Span, span};

/// Span for one gateway request.
pub fn gateway_span(route: &str, request_id: &str) -> Span {
    span!(
        Level::INFO,
        "gateway.request",
        http.route = route,
        request.id = request_id,
    )
}

/// Span for one job execution attempt.
///
/// When the submitting request carried a trace context, the span joins that
/// trace as a child.
pub fn job_span(job_id: &str, worker_id: &str, attempt: u32, parent: Option<&TraceContext>) -> Span {
    let ctx = parent.map(TraceContext::child);
    span!(
        Level::INFO,
        "job.execute",
        job.id = job_id,
        job.attempt = attempt,
        worker.id = worker_id,
        trace.id = ctx.as_ref().map(|c| c.trace_id.as_str()).unwrap_or(""),
        trace.parent_span_id = ctx
            .as_ref()
            .and_then(|c| c.parent_span_id.as_deref())
            .unwrap_or(""),
    )
}

/// Span for cache operations.
pub fn cache_span(operation: &str, key: &str) -> Span {
    span!(
        Level::DEBUG,
        "cache.operation",
        operation = operation,
        cache.key = key,
    )
}
