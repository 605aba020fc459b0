// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Topology
//!
//! Declares the consumed queue and, when configured, binds it to an existing
//! exchange. The input never declares exchanges: binding to an exchange that does
//! not exist fails the startup.

use crate::{
    channel::BrokerChannel,
    errors::AmqpError,
    queue::{Queue, QueueBinding, QueueDefinition},
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Installs the queue topology through a broker channel.
pub struct AmqpTopology {
    channel: Arc<dyn BrokerChannel>,
}

impl AmqpTopology {
    /// Creates a topology installer on `channel`.
    pub fn new(channel: Arc<dyn BrokerChannel>) -> AmqpTopology {
        AmqpTopology { channel }
    }

    /// Declares the queue, then applies the binding if any.
    pub async fn install(
        &self,
        def: &QueueDefinition,
        binding: Option<&QueueBinding>,
    ) -> Result<Queue, AmqpError> {
        let queue = self.declare_queue(def).await?;

        if let Some(binding) = binding {
            self.bind(&queue, binding).await?;
        }

        Ok(queue)
    }

    /// Declares `def`. A passive declaration fails when the queue is missing.
    pub async fn declare_queue(&self, def: &QueueDefinition) -> Result<Queue, AmqpError> {
        debug!(
            queue = def.name(),
            passive = def.is_passive(),
            durable = def.is_durable(),
            exclusive = def.is_exclusive(),
            auto_delete = def.is_auto_delete(),
            "declaring queue"
        );

        match self.channel.declare_queue(def).await {
            Ok(queue) => {
                debug!(
                    queue = %queue.name,
                    messages = queue.message_count,
                    consumers = queue.consumer_count,
                    "queue declared"
                );
                Ok(queue)
            }
            Err(err) => {
                error!(error = err.to_string(), queue = def.name(), "error to declare the queue");
                Err(err)
            }
        }
    }

    /// Binds `queue` to the exchange of `binding` with its routing key pattern.
    ///
    /// # Parameters
    /// * `queue` - The declared queue
    /// * `binding` - Exchange and routing key pattern
    ///
    /// # Returns
    /// `AmqpError::BindingExchangeToQueueError` when the broker refuses the binding
    pub async fn bind(&self, queue: &Queue, binding: &QueueBinding) -> Result<(), AmqpError> {
        info!(
            "binding queue: {} to the exchange: {} with the key: {}",
            queue.name,
            binding.exchange_name(),
            binding.routing_key_pattern()
        );

        self.channel.bind_queue(queue, binding).await
    }
}

/// Topic-exchange matching of a routing key against a binding pattern.
///
/// Words are dot-separated; `*` matches exactly one word and `#` zero or more.
pub fn routing_key_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let words: Vec<&str> = if routing_key.is_empty() {
        vec![]
    } else {
        routing_key.split('.').collect()
    };

    matches_words(&pattern, &words)
}

fn matches_words(pattern: &[&str], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((&"#", rest)) => (0..=words.len()).any(|skip| matches_words(rest, &words[skip..])),
        Some((&"*", rest)) => !words.is_empty() && matches_words(rest, &words[1..]),
        Some((word, rest)) => words.first() == Some(word) && matches_words(rest, &words[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_zero_or_more_words() {
        assert!(routing_key_matches("#", ""));
        assert!(routing_key_matches("#", "orders"));
        assert!(routing_key_matches("#", "orders.created.eu"));
        assert!(routing_key_matches("orders.#", "orders"));
        assert!(routing_key_matches("orders.#", "orders.created.eu"));
        assert!(routing_key_matches("#.eu", "orders.created.eu"));
        assert!(!routing_key_matches("orders.#", "invoices.created"));
    }

    #[test]
    fn star_matches_exactly_one_word() {
        assert!(routing_key_matches("orders.*", "orders.created"));
        assert!(!routing_key_matches("orders.*", "orders"));
        assert!(!routing_key_matches("orders.*", "orders.created.eu"));
        assert!(routing_key_matches("tag.*.info", "tag.web.info"));
        assert!(!routing_key_matches("tag.*.info", "tag.web.error"));
    }

    #[test]
    fn literal_words_match_exactly() {
        assert!(routing_key_matches("foo.bar", "foo.bar"));
        assert!(!routing_key_matches("foo.bar", "foo.baz"));
        assert!(!routing_key_matches("foo", "foo.bar"));
    }
}
