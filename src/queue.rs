// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! Types describing the queue the input consumes from, the optional binding of
//! that queue to an exchange, and the queue as reported back by the broker.

/// Definition of the queue to declare, with its declaration flags.
///
/// This struct implements the builder pattern. A passive definition only checks
/// that the queue already exists and never creates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
    pub(crate) passive: bool,
}

impl QueueDefinition {
    /// Creates a new queue definition with the given name.
    ///
    /// By default, the queue is non-durable, non-exclusive, not auto-deleted and
    /// declared actively.
    ///
    /// # Parameters
    /// * `name` - The name of the queue
    ///
    /// # Returns
    /// A new queue definition with default settings
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            durable: false,
            delete: false,
            exclusive: false,
            passive: false,
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the queue to auto-delete when its last consumer goes away.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Only checks for the queue's existence instead of creating it.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Returns the name of the queue.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the queue survives broker restarts.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Returns whether the queue is deleted once its last consumer is gone.
    pub fn is_auto_delete(&self) -> bool {
        self.delete
    }

    /// Returns whether the queue is exclusive to the declaring connection.
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Returns whether the declaration only checks that the queue exists.
    pub fn is_passive(&self) -> bool {
        self.passive
    }
}

/// Configuration for binding the consumed queue to an exchange.
///
/// The routing key is a pattern with broker wildcard semantics: `#` matches zero
/// or more dot-separated words, `*` matches exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub(crate) exchange_name: String,
    pub(crate) routing_key: String,
}

impl QueueBinding {
    /// Creates a new binding to the given exchange matching every routing key.
    ///
    /// # Parameters
    /// * `exchange` - The name of the exchange to bind to
    ///
    /// # Returns
    /// A new binding with the `#` routing key
    pub fn new(exchange: &str) -> QueueBinding {
        QueueBinding {
            exchange_name: exchange.to_owned(),
            routing_key: "#".to_owned(),
        }
    }

    /// Sets the routing key pattern for the binding.
    ///
    /// # Parameters
    /// * `key` - Routing key pattern, may contain `#` and `*` wildcards
    ///
    /// # Returns
    /// Self for method chaining
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }

    /// Returns the name of the bound exchange.
    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    /// Returns the routing key pattern of the binding.
    pub fn routing_key_pattern(&self) -> &str {
        &self.routing_key
    }
}

/// A queue as acknowledged by the broker after declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

impl Queue {
    /// Creates a queue with no messages and no consumers.
    pub fn new(name: &str) -> Queue {
        Queue {
            name: name.to_owned(),
            message_count: 0,
            consumer_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_declaration_flags() {
        let def = QueueDefinition::new("events").durable().passive();

        assert_eq!(def.name(), "events");
        assert!(def.is_durable());
        assert!(def.is_passive());
        assert!(!def.is_exclusive());
        assert!(!def.is_auto_delete());
    }

    #[test]
    fn binding_defaults_to_match_all() {
        let binding = QueueBinding::new("logs");
        assert_eq!(binding.routing_key_pattern(), "#");

        let binding = binding.routing_key("app.*.error");
        assert_eq!(binding.exchange_name(), "logs");
        assert_eq!(binding.routing_key_pattern(), "app.*.error");
    }
}
