// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the AMQP Input
//!
//! Three families of errors live here:
//! - `ConfigError`: startup faults, the input refuses to start.
//! - `AmqpError`: broker session, topology and per-message faults.
//! - `RouterError`: a failure reported by the downstream pipeline.
//!
//! Payload parse degradation is deliberately absent: a payload that cannot be
//! parsed is wrapped and forwarded, never turned into an error.

use std::io;
use thiserror::Error;

/// Startup configuration faults.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither `host` nor `hosts` was provided
    #[error("'host(s)' and 'queue' must be all specified: no broker host configured")]
    MissingHosts,

    /// No queue name was provided
    #[error("'host(s)' and 'queue' must be all specified: no queue configured")]
    MissingQueue,

    /// `tls` is enabled but the client identity is incomplete
    #[error("'tls_key' and 'tls_cert' must be all specified if tls is enabled, missing `{0}`")]
    IncompleteTls(&'static str),

    /// A host entry could not be turned into an endpoint
    #[error("invalid broker endpoint `{0}`")]
    InvalidEndpoint(String),

    /// The payload format has no registered parser
    #[error("unknown payload format `{0}`")]
    UnknownPayloadFormat(String),

    /// A file referenced by the configuration could not be read
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The settings file is not valid TOML or has wrongly typed options
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure reported by the downstream pipeline when a record cannot be accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("router failure: {0}")]
pub struct RouterError(pub String);

impl RouterError {
    /// Creates a router error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        RouterError(reason.into())
    }
}

/// Represents errors that can occur while running the AMQP input.
///
/// Startup variants (`Config`, `ConnectionError`, `ChannelError`, the topology
/// variants and `BindingConsumerError`) abort `AmqpInput::start`. The remaining
/// variants are per-message and only decide how a single delivery is settled.
#[derive(Error, Debug)]
pub enum AmqpError {
    /// Invalid configuration detected before connecting
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No configured endpoint accepted the connection
    #[error("failure to connect: {0}")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel: {0}")]
    ChannelError(String),

    /// Error closing the channel or the connection
    #[error("failure to close the connection: {0}")]
    CloseError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    /// Error binding a queue to an exchange
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error registering the consumer on the queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error reported by the broker while streaming deliveries
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// The time header could not be turned into a timestamp
    #[error("failure to parse time header `{header}` value `{value}`")]
    TimeParseError { header: String, value: String },

    /// The router refused the record
    #[error(transparent)]
    Forwarding(#[from] RouterError),

    /// Error acknowledging a message
    #[error("failure to ack message `{0}`")]
    AckMessageError(u64),

    /// Error rejecting a message
    #[error("failure to reject message `{0}`")]
    RejectMessageError(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_error_converts_into_forwarding() {
        let err: AmqpError = RouterError::new("sink down").into();
        assert!(matches!(err, AmqpError::Forwarding(_)));
        assert_eq!(err.to_string(), "router failure: sink down");
    }

    #[test]
    fn config_error_is_transparent() {
        let err: AmqpError = ConfigError::IncompleteTls("tls_key").into();
        assert_eq!(
            err.to_string(),
            "'tls_key' and 'tls_cert' must be all specified if tls is enabled, missing `tls_key`"
        );
    }
}
