// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Inbound Deliveries
//!
//! A broker-independent view of one in-flight message. The lapin `Delivery` is
//! converted once when it leaves the consumer stream so that the resolvers and
//! the dispatcher never touch AMQP field types directly.

use lapin::{
    message::Delivery,
    protocol::basic::AMQPProperties,
    types::{AMQPValue, FieldTable},
};
use std::{collections::BTreeMap, fmt};

/// Message headers keyed by header name.
pub type Headers = BTreeMap<String, HeaderValue>;

/// The subset of AMQP field values the input understands.
///
/// Arrays, nested tables, decimals and void values carry nothing a tag or a
/// timestamp could be derived from and are left out during conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Seconds since the Unix epoch
    Timestamp(u64),
}

impl HeaderValue {
    /// Returns the value if it is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(value) => f.write_str(value),
            HeaderValue::Integer(value) => write!(f, "{}", value),
            HeaderValue::Float(value) => write!(f, "{}", value),
            HeaderValue::Boolean(value) => write!(f, "{}", value),
            HeaderValue::Timestamp(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_owned())
    }
}

impl TryFrom<&AMQPValue> for HeaderValue {
    type Error = ();

    fn try_from(value: &AMQPValue) -> Result<Self, ()> {
        let converted = match value {
            AMQPValue::LongString(s) => {
                HeaderValue::Text(String::from_utf8_lossy(s.as_bytes()).into_owned())
            }
            AMQPValue::ShortString(s) => HeaderValue::Text(s.as_str().to_owned()),
            AMQPValue::ByteArray(b) => {
                HeaderValue::Text(String::from_utf8_lossy(b.as_slice()).into_owned())
            }
            AMQPValue::Boolean(b) => HeaderValue::Boolean(*b),
            AMQPValue::ShortShortInt(i) => HeaderValue::Integer(i64::from(*i)),
            AMQPValue::ShortShortUInt(i) => HeaderValue::Integer(i64::from(*i)),
            AMQPValue::ShortInt(i) => HeaderValue::Integer(i64::from(*i)),
            AMQPValue::ShortUInt(i) => HeaderValue::Integer(i64::from(*i)),
            AMQPValue::LongInt(i) => HeaderValue::Integer(i64::from(*i)),
            AMQPValue::LongUInt(i) => HeaderValue::Integer(i64::from(*i)),
            AMQPValue::LongLongInt(i) => HeaderValue::Integer(*i),
            AMQPValue::Float(f) => HeaderValue::Float(f64::from(*f)),
            AMQPValue::Double(f) => HeaderValue::Float(*f),
            AMQPValue::Timestamp(t) => HeaderValue::Timestamp(*t),
            _ => return Err(()),
        };

        Ok(converted)
    }
}

/// One message handed to the input by the broker.
///
/// Settled exactly once, by acknowledging or rejecting its `delivery_tag`.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundDelivery {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub body: Vec<u8>,
    pub headers: Headers,
}

impl InboundDelivery {
    /// Creates a delivery with no exchange, no headers and a first-time flag.
    pub fn new(delivery_tag: u64, routing_key: &str, body: impl Into<Vec<u8>>) -> Self {
        InboundDelivery {
            delivery_tag,
            exchange: String::new(),
            routing_key: routing_key.to_owned(),
            redelivered: false,
            body: body.into(),
            headers: Headers::default(),
        }
    }

    /// Adds a header, replacing any previous value under the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.to_owned(), value.into());
        self
    }

    /// Marks the delivery as redelivered by the broker.
    pub fn redelivered(mut self) -> Self {
        self.redelivered = true;
        self
    }
}

impl From<Delivery> for InboundDelivery {
    fn from(delivery: Delivery) -> Self {
        InboundDelivery {
            delivery_tag: delivery.delivery_tag,
            exchange: delivery.exchange.to_string(),
            routing_key: delivery.routing_key.to_string(),
            redelivered: delivery.redelivered,
            headers: extract_headers(&delivery.properties),
            body: delivery.data,
        }
    }
}

/// Projects the AMQP header table onto `Headers`, skipping unsupported values.
pub(crate) fn extract_headers(props: &AMQPProperties) -> Headers {
    let table = match props.headers() {
        Some(val) => val.to_owned(),
        None => FieldTable::default(),
    };

    table
        .inner()
        .iter()
        .filter_map(|(name, value)| {
            HeaderValue::try_from(value)
                .ok()
                .map(|value| (name.as_str().to_owned(), value))
        })
        .collect()
}
