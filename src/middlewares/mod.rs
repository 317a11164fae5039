use std::{fmt::Display, time::Duration};

use axum::{
    Router,
    body::Bytes,
    extract::Request,
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::{Span, error, info, info_span};

/// Middleware for logging each request.
///
/// Every request gets an info span with its method, path and conditional
/// headers, the response status and latency are logged when it finishes.
pub fn logging_route(router: Router) -> Router {
    let make_span = |req: &Request<_>| {
        let empty = &HeaderValue::from_static("");
        let headers = req.headers();
        let if_none_match = headers
            .get("If-None-Match")
            .unwrap_or(empty)
            .to_str()
            .unwrap_or("");
        let if_modified_since = headers
            .get("If-Modified-Since")
            .unwrap_or(empty)
            .to_str()
            .unwrap_or("");
        info_span!(
            "HTTP",
            method = ?req.method(),
            uri = ?req.uri(),
            if_none_match,
            if_modified_since
        )
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(make_span)
        .on_request(|_req: &Request<_>, _span: &Span| {})
        .on_response(|res: &Response, latency: Duration, _span: &Span| {
            info!("{}", format_latency(latency, res.status()));
        })
        .on_body_chunk(|_chunk: &Bytes, _latency: Duration, _span: &Span| {})
        .on_eos(|_trailers: Option<&HeaderMap>, _stream_duration: Duration, _span: &Span| {})
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                error!("{}", format_latency(latency, error));
            },
        );

    router.layer(trace_layer)
}

/// Format request latency and status message
/// return a string
fn format_latency(latency: Duration, status: impl Display) -> String {
    let micros = latency.as_micros();
    let millis = latency.as_millis();
    if micros >= 1000 {
        format!("{status} {millis}ms")
    } else {
        format!("{status} {micros}μs")
    }
}
