// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Tag Resolution
//!
//! Computes the routing label attached to every forwarded record, in priority
//! order: the delivery's routing key (when enabled and non-empty), then a tag
//! header (when configured and present), then the static tag.

use crate::delivery::Headers;

/// Default static tag.
pub const DEFAULT_TAG: &str = "hunter.amqp";

/// Resolves the tag of a delivery from its routing key, its headers or a
/// static fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagResolver {
    static_tag: String,
    use_routing_key: bool,
    header: Option<String>,
}

impl Default for TagResolver {
    fn default() -> Self {
        TagResolver::new(DEFAULT_TAG)
    }
}

impl TagResolver {
    /// Creates a resolver that always yields `static_tag`.
    ///
    /// # Parameters
    /// * `static_tag` - Tag used when neither the routing key nor a header applies
    ///
    /// # Returns
    /// A new resolver with routing key and header lookup disabled
    pub fn new(static_tag: &str) -> Self {
        TagResolver {
            static_tag: static_tag.to_owned(),
            use_routing_key: false,
            header: None,
        }
    }

    /// Prefers the delivery's routing key whenever it is non-empty.
    pub fn use_routing_key(mut self, enabled: bool) -> Self {
        self.use_routing_key = enabled;
        self
    }

    /// Reads the tag from `header` when the routing key is not used.
    pub fn header(mut self, header: Option<&str>) -> Self {
        self.header = header.map(str::to_owned);
        self
    }

    /// Returns the fallback tag.
    pub fn static_tag(&self) -> &str {
        &self.static_tag
    }

    /// Resolves the tag of one delivery.
    ///
    /// # Parameters
    /// * `routing_key` - Routing key the delivery was published with
    /// * `headers` - Headers of the delivery
    ///
    /// # Returns
    /// The routing key when enabled and non-empty, else the configured header
    /// when present, else the static tag
    pub fn resolve(&self, routing_key: &str, headers: &Headers) -> String {
        if self.use_routing_key && !routing_key.is_empty() {
            return routing_key.to_owned();
        }

        if let Some(value) = self.header.as_ref().and_then(|name| headers.get(name)) {
            return value.to_string();
        }

        self.static_tag.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), HeaderValue::from(*v)))
            .collect()
    }

    #[test]
    fn routing_key_wins_when_enabled() {
        let resolver = TagResolver::default()
            .use_routing_key(true)
            .header(Some("x-tag"));

        assert_eq!(
            resolver.resolve("orders.created", &Headers::default()),
            "orders.created"
        );
        assert_eq!(
            resolver.resolve("orders.created", &headers(&[("x-tag", "custom")])),
            "orders.created"
        );
    }

    #[test]
    fn empty_routing_key_falls_through_to_header() {
        let resolver = TagResolver::default()
            .use_routing_key(true)
            .header(Some("x-tag"));

        assert_eq!(resolver.resolve("", &headers(&[("x-tag", "custom")])), "custom");
    }

    #[test]
    fn header_is_used_when_routing_key_disabled() {
        let resolver = TagResolver::default().header(Some("x-tag"));

        assert_eq!(
            resolver.resolve("orders.created", &headers(&[("x-tag", "custom")])),
            "custom"
        );
    }

    #[test]
    fn non_text_header_renders_its_value() {
        let resolver = TagResolver::default().header(Some("x-shard"));
        let mut hdrs = Headers::default();
        hdrs.insert("x-shard".to_owned(), HeaderValue::Integer(12));

        assert_eq!(resolver.resolve("", &hdrs), "12");
    }

    #[test]
    fn static_tag_is_the_default() {
        let resolver = TagResolver::default().header(Some("x-tag"));

        assert_eq!(resolver.resolve("orders.created", &Headers::default()), "hunter.amqp");
        assert_eq!(
            TagResolver::new("app.events").resolve("", &headers(&[("x-tag", "custom")])),
            "app.events"
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = TagResolver::default().use_routing_key(true);
        let hdrs = headers(&[("x-tag", "custom")]);

        assert_eq!(
            resolver.resolve("foo.bar", &hdrs),
            resolver.resolve("foo.bar", &hdrs)
        );
    }
}
