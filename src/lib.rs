// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! AMQP input: consumes one RabbitMQ queue in manual acknowledgment mode and
//! forwards every message to a `Router` as a `(tag, time, record)` triple.
//!
//! Delivery is at-least-once. Records whose forwarding fails are requeued on the
//! broker and will be emitted again.

mod consumer;
mod otel;

pub mod channel;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod errors;
pub mod input;
pub mod logging;
pub mod payload;
pub mod queue;
pub mod router;
pub mod tag;
pub mod time;
pub mod topology;

pub use consumer::ConsumeStats;
