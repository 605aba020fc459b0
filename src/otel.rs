// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Integration
//!
//! Extracts the trace context a publisher propagated through message headers and
//! opens one consumer span per delivery under it.

use crate::delivery::Headers;
use opentelemetry::{
    global::{BoxedSpan, BoxedTracer},
    propagation::Extractor,
    trace::{SpanKind, Tracer},
};
use std::borrow::Cow;

/// Reads trace context values out of delivery headers.
pub(crate) struct HeadersExtractor<'a> {
    headers: &'a Headers,
}

impl<'a> HeadersExtractor<'a> {
    pub(crate) fn new(headers: &'a Headers) -> Self {
        Self { headers }
    }
}

impl Extractor for HeadersExtractor<'_> {
    /// Only text headers can carry propagated context.
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|value| value.as_text())
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(String::as_str).collect()
    }
}

/// Creates a consumer span named `name`, parented by the propagated context.
pub(crate) fn new_span(headers: &Headers, tracer: &BoxedTracer, name: &str) -> BoxedSpan {
    let ctx = opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeadersExtractor::new(headers))
    });

    tracer
        .span_builder(Cow::from(name.to_owned()))
        .with_kind(SpanKind::Consumer)
        .start_with_context(tracer, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::HeaderValue;

    #[test]
    fn extractor_exposes_text_headers_only() {
        let mut headers = Headers::default();
        headers.insert("traceparent".to_owned(), HeaderValue::from("00-abc-def-01"));
        headers.insert("x-count".to_owned(), HeaderValue::Integer(3));

        let extractor = HeadersExtractor::new(&headers);
        assert_eq!(extractor.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(extractor.get("x-count"), None);
        assert_eq!(extractor.keys(), vec!["traceparent", "x-count"]);
    }
}
