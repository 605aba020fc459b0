// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Downstream Router
//!
//! The `Router` trait is the input's only output boundary: every delivery turns
//! into exactly one `emit` call. Routers must tolerate duplicates since a record
//! whose delivery was requeued will be emitted again on redelivery.

use crate::{errors::RouterError, payload::Record, time::EventTime};
use async_trait::async_trait;
use serde_json::json;
use std::io::{self, Write};

#[cfg(test)]
use mockall::automock;

/// Accepts `(tag, time, record)` triples from the input.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Router: Send + Sync {
    async fn emit(&self, tag: &str, time: EventTime, record: Record) -> Result<(), RouterError>;
}

/// Writes every record as one JSON line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutRouter;

impl StdoutRouter {
    pub(crate) fn write_line<W: Write>(
        out: &mut W,
        tag: &str,
        time: EventTime,
        record: Record,
    ) -> io::Result<()> {
        let line = json!({
            "tag": tag,
            "time": time.to_rfc3339(),
            "record": record,
        });

        serde_json::to_writer(&mut *out, &line)?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

#[async_trait]
impl Router for StdoutRouter {
    async fn emit(&self, tag: &str, time: EventTime, record: Record) -> Result<(), RouterError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();

        StdoutRouter::write_line(&mut out, tag, time, record)
            .map_err(|err| RouterError::new(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    #[test]
    fn writes_one_json_line_per_record() {
        let mut out = Vec::new();
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = json!({"x": 1}).as_object().cloned().unwrap();

        StdoutRouter::write_line(&mut out, "hunter.amqp", time, record).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));

        let line: Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(line["tag"], "hunter.amqp");
        assert_eq!(line["time"], "2024-01-01T00:00:00+00:00");
        assert_eq!(line["record"]["x"], 1);
    }
}
