// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Dispatcher
//!
//! Handles one delivery end to end: payload, tag and time resolution, a single
//! call to the `Router`, then exactly one settlement of the delivery tag.
//!
//! - Router success: positive ack of this delivery only.
//! - Router failure or unparseable time header: reject with requeue.
//!
//! There is no retry cap and no dead-lettering. A message that keeps failing is
//! redelivered for as long as the downstream keeps refusing it.

use crate::{
    channel::Acknowledger,
    delivery::InboundDelivery,
    errors::AmqpError,
    otel,
    payload::PayloadResolver,
    queue::QueueBinding,
    router::Router,
    tag::TagResolver,
    time::TimeResolver,
    topology::routing_key_matches,
};
use opentelemetry::{
    global::{self, BoxedTracer},
    trace::{Span, Status},
};
use std::{borrow::Cow, sync::Arc};
use tracing::{debug, warn};

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acknowledged,
    Requeued,
}

/// Processes deliveries one by one and settles each on the `Acknowledger`.
pub struct MessageDispatcher<A: Acknowledger + ?Sized> {
    acker: Arc<A>,
    router: Arc<dyn Router>,
    payload: PayloadResolver,
    tags: TagResolver,
    times: TimeResolver,
    queue_name: String,
    binding: Option<QueueBinding>,
    tracer: BoxedTracer,
}

impl<A: Acknowledger + ?Sized> MessageDispatcher<A> {
    /// Creates a new dispatcher.
    ///
    /// # Parameters
    /// * `acker` - Channel the deliveries arrive on
    /// * `router` - Downstream receiving the resolved records
    /// * `payload` - Body parser, resolved once at start
    /// * `tags` - Tag resolution rules
    /// * `times` - Time resolution rules
    ///
    /// # Returns
    /// A dispatcher without a binding, tracing under the `amqp` span name
    pub fn new(
        acker: Arc<A>,
        router: Arc<dyn Router>,
        payload: PayloadResolver,
        tags: TagResolver,
        times: TimeResolver,
    ) -> Self {
        MessageDispatcher {
            acker,
            router,
            payload,
            tags,
            times,
            queue_name: String::from("amqp"),
            binding: None,
            tracer: global::tracer("amqp input"),
        }
    }

    /// Names the consumed queue, used for span names.
    pub fn queue_name(mut self, name: &str) -> Self {
        self.queue_name = name.to_owned();
        self
    }

    /// Remembers the binding so deliveries it would not route can be reported.
    pub fn binding(mut self, binding: Option<QueueBinding>) -> Self {
        self.binding = binding;
        self
    }

    /// Processes one delivery and settles it.
    ///
    /// Per-message faults never surface as `Err`; they become `Requeued`. An `Err`
    /// means the settlement itself could not be sent to the broker.
    pub async fn dispatch(&self, delivery: InboundDelivery) -> Result<DeliveryOutcome, AmqpError> {
        let mut span = otel::new_span(&delivery.headers, &self.tracer, &self.queue_name);

        debug!(
            delivery_tag = delivery.delivery_tag,
            routing_key = delivery.routing_key,
            redelivered = delivery.redelivered,
            "received message"
        );

        if let Some(binding) = &self.binding {
            if !delivery.exchange.is_empty()
                && !routing_key_matches(binding.routing_key_pattern(), &delivery.routing_key)
            {
                debug!(
                    routing_key = delivery.routing_key,
                    pattern = binding.routing_key_pattern(),
                    "routing key outside of the configured binding"
                );
            }
        }

        let record = self.payload.resolve(&delivery.body);
        let tag = self.tags.resolve(&delivery.routing_key, &delivery.headers);

        let forwarded = match self.times.resolve(&delivery.headers) {
            Ok(time) => self
                .router
                .emit(&tag, time, record)
                .await
                .map_err(AmqpError::from),
            Err(err) => Err(err),
        };

        match forwarded {
            Ok(()) => {
                self.acker.ack(delivery.delivery_tag).await.inspect_err(|err| {
                    span.record_error(err);
                    span.set_status(Status::Error {
                        description: Cow::from("error to ack msg"),
                    });
                })?;

                debug!(delivery_tag = delivery.delivery_tag, tag, "acknowledged message");
                span.set_status(Status::Ok);
                Ok(DeliveryOutcome::Acknowledged)
            }
            Err(err) => {
                if delivery.redelivered {
                    warn!(
                        error = err.to_string(),
                        delivery_tag = delivery.delivery_tag,
                        tag,
                        "redelivered message failed again, requeuing"
                    );
                } else {
                    warn!(
                        error = err.to_string(),
                        delivery_tag = delivery.delivery_tag,
                        tag,
                        "failure forwarding message, requeuing"
                    );
                }
                span.record_error(&err);
                span.set_status(Status::Error {
                    description: Cow::from("message requeued"),
                });

                self.acker.reject(delivery.delivery_tag, true).await?;
                Ok(DeliveryOutcome::Requeued)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::MockAcknowledger,
        errors::RouterError,
        payload::ParserRegistry,
        router::MockRouter,
    };
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use serde_json::json;

    fn dispatcher(
        acker: MockAcknowledger,
        router: MockRouter,
        tags: TagResolver,
        times: TimeResolver,
    ) -> MessageDispatcher<MockAcknowledger> {
        MessageDispatcher::new(
            Arc::new(acker),
            Arc::new(router),
            ParserRegistry::default().resolver(Some("json")).unwrap(),
            tags,
            times,
        )
        .queue_name("events")
    }

    #[tokio::test]
    async fn forwards_and_acknowledges_on_success() {
        let mut router = MockRouter::new();
        router
            .expect_emit()
            .withf(|tag, _, record| {
                tag == "hunter.amqp" && record == json!({"x": 1}).as_object().unwrap()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut acker = MockAcknowledger::new();
        acker.expect_ack().with(eq(7)).times(1).returning(|_| Ok(()));
        acker.expect_reject().never();

        let dispatcher = dispatcher(acker, router, TagResolver::default(), TimeResolver::default());
        let outcome = dispatcher
            .dispatch(InboundDelivery::new(7, "foo.bar", &br#"{"x":1}"#[..]))
            .await
            .unwrap();

        assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    }

    #[tokio::test]
    async fn router_failure_requeues() {
        let mut router = MockRouter::new();
        router
            .expect_emit()
            .times(1)
            .returning(|_, _, _| Err(RouterError::new("buffer full")));

        let mut acker = MockAcknowledger::new();
        acker.expect_ack().never();
        acker
            .expect_reject()
            .with(eq(9), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = dispatcher(acker, router, TagResolver::default(), TimeResolver::default());
        let outcome = dispatcher
            .dispatch(InboundDelivery::new(9, "foo.bar", &b"{}"[..]).redelivered())
            .await
            .unwrap();

        assert_eq!(outcome, DeliveryOutcome::Requeued);
    }

    #[tokio::test]
    async fn malformed_time_header_requeues_without_forwarding() {
        let mut router = MockRouter::new();
        router.expect_emit().never();

        let mut acker = MockAcknowledger::new();
        acker.expect_ack().never();
        acker
            .expect_reject()
            .with(eq(3), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = dispatcher(
            acker,
            router,
            TagResolver::default(),
            TimeResolver::new(Some("x-sent-at")),
        );
        let delivery =
            InboundDelivery::new(3, "", &b"{}"[..]).with_header("x-sent-at", "not a time");

        assert_eq!(
            dispatcher.dispatch(delivery).await.unwrap(),
            DeliveryOutcome::Requeued
        );
    }

    #[tokio::test]
    async fn resolves_tag_and_time_from_headers() {
        let sent_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut router = MockRouter::new();
        router
            .expect_emit()
            .withf(move |tag, time, record| {
                tag == "custom"
                    && *time == sent_at
                    && record == json!({"message": "plain text"}).as_object().unwrap()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut acker = MockAcknowledger::new();
        acker.expect_ack().with(eq(1)).times(1).returning(|_| Ok(()));

        let dispatcher = dispatcher(
            acker,
            router,
            TagResolver::default().header(Some("x-tag")),
            TimeResolver::new(Some("x-sent-at")),
        );
        let delivery = InboundDelivery::new(1, "orders.created", &b"plain text"[..])
            .with_header("x-tag", "custom")
            .with_header("x-sent-at", "2024-01-01T00:00:00Z");

        assert_eq!(
            dispatcher.dispatch(delivery).await.unwrap(),
            DeliveryOutcome::Acknowledged
        );
    }

    #[tokio::test]
    async fn ack_failure_is_reported() {
        let mut router = MockRouter::new();
        router.expect_emit().returning(|_, _, _| Ok(()));

        let mut acker = MockAcknowledger::new();
        acker
            .expect_ack()
            .returning(|tag| Err(AmqpError::AckMessageError(tag)));

        let dispatcher = dispatcher(acker, router, TagResolver::default(), TimeResolver::default());
        let result = dispatcher
            .dispatch(InboundDelivery::new(5, "", &b"{}"[..]))
            .await;

        assert!(matches!(result, Err(AmqpError::AckMessageError(5))));
    }

    #[tokio::test]
    async fn reject_failure_is_reported() {
        let mut router = MockRouter::new();
        router
            .expect_emit()
            .returning(|_, _, _| Err(RouterError::new("down")));

        let mut acker = MockAcknowledger::new();
        acker
            .expect_reject()
            .returning(|tag, _| Err(AmqpError::RejectMessageError(tag)));

        let dispatcher = dispatcher(acker, router, TagResolver::default(), TimeResolver::default());
        let result = dispatcher
            .dispatch(InboundDelivery::new(6, "", &b"{}"[..]))
            .await;

        assert!(matches!(result, Err(AmqpError::RejectMessageError(6))));
    }
}
