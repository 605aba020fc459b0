// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Payload Resolution
//!
//! Turns a raw message body into a `Record`. Parsers are selected by format name
//! through a `ParserRegistry` once, when the input starts, and the resulting
//! `PayloadResolver` is reused for every delivery.
//!
//! Malformed input never fails a delivery: when the parser yields nothing the
//! body is wrapped into a single-field `{"message": body}` record and forwarded.

use crate::errors::ConfigError;
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::warn;

/// A structured record, field name to value.
pub type Record = Map<String, Value>;

/// Field used by the fallback record.
pub const FALLBACK_FIELD: &str = "message";

/// Capability every payload parser provides.
///
/// Returning `None` means no record could be produced from `body`.
pub trait PayloadParser: Send + Sync {
    fn parse(&self, body: &[u8]) -> Option<Record>;
}

/// Parses a JSON object document.
///
/// Valid JSON that is not an object (arrays, scalars) yields no record.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl PayloadParser for JsonParser {
    fn parse(&self, body: &[u8]) -> Option<Record> {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(record)) => Some(record),
            _ => None,
        }
    }
}

/// Parses Labeled Tab-Separated Values: `label:value` pairs split by tabs.
///
/// A field without a `:` separator makes the whole line unparseable.
#[derive(Debug, Default, Clone, Copy)]
pub struct LtsvParser;

impl PayloadParser for LtsvParser {
    fn parse(&self, body: &[u8]) -> Option<Record> {
        let text = std::str::from_utf8(body).ok()?;
        let line = text.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return None;
        }

        let mut record = Record::new();
        for field in line.split('\t') {
            let (label, value) = field.split_once(':')?;
            record.insert(label.to_owned(), Value::String(value.to_owned()));
        }

        Some(record)
    }
}

type ParserFactory = Arc<dyn Fn() -> Box<dyn PayloadParser> + Send + Sync>;

/// Maps format names to parser factories.
///
/// The default registry knows `json`, `ltsv` and `none`; `none` disables parsing
/// so every body is wrapped.
#[derive(Clone)]
pub struct ParserRegistry {
    factories: HashMap<String, Option<ParserFactory>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        ParserRegistry::empty()
            .register("json", || Box::new(JsonParser))
            .register("ltsv", || Box::new(LtsvParser))
            .disabled("none")
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        formats.sort_unstable();
        f.debug_struct("ParserRegistry")
            .field("formats", &formats)
            .finish()
    }
}

impl ParserRegistry {
    /// A registry with no formats at all.
    pub fn empty() -> Self {
        ParserRegistry {
            factories: HashMap::default(),
        }
    }

    /// Registers a parser factory under `format`, replacing any previous one.
    pub fn register<F>(mut self, format: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn PayloadParser> + Send + Sync + 'static,
    {
        self.factories
            .insert(format.to_owned(), Some(Arc::new(factory)));
        self
    }

    /// Registers `format` as a name that selects no parser.
    pub fn disabled(mut self, format: &str) -> Self {
        self.factories.insert(format.to_owned(), None);
        self
    }

    /// Builds the resolver for `format`. `None` means no parser is configured.
    pub fn resolver(&self, format: Option<&str>) -> Result<PayloadResolver, ConfigError> {
        let Some(format) = format else {
            return Ok(PayloadResolver::new(None));
        };

        match self.factories.get(format) {
            Some(Some(factory)) => Ok(PayloadResolver::new(Some(factory()))),
            Some(None) => Ok(PayloadResolver::new(None)),
            None => Err(ConfigError::UnknownPayloadFormat(format.to_owned())),
        }
    }
}

/// Produces a record for every message body.
pub struct PayloadResolver {
    parser: Option<Box<dyn PayloadParser>>,
}

impl PayloadResolver {
    /// Creates a resolver; `None` disables parsing.
    pub fn new(parser: Option<Box<dyn PayloadParser>>) -> Self {
        PayloadResolver { parser }
    }

    /// Returns whether bodies are parsed at all.
    pub fn has_parser(&self) -> bool {
        self.parser.is_some()
    }

    /// Parses `body`, or wraps it into the fallback record.
    pub fn resolve(&self, body: &[u8]) -> Record {
        let Some(parser) = &self.parser else {
            return fallback_record(body);
        };

        match parser.parse(body) {
            Some(record) => record,
            None => {
                warn!(
                    body = %String::from_utf8_lossy(body),
                    "failed to parse payload, forwarding it wrapped"
                );
                fallback_record(body)
            }
        }
    }
}

impl fmt::Debug for PayloadResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadResolver")
            .field("has_parser", &self.has_parser())
            .finish()
    }
}

fn fallback_record(body: &[u8]) -> Record {
    let mut record = Record::new();
    record.insert(
        FALLBACK_FIELD.to_owned(),
        Value::String(String::from_utf8_lossy(body).into_owned()),
    );
    record
}
