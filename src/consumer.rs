// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Subscription Loop
//!
//! Pulls deliveries off the consumer stream and hands them to the dispatcher,
//! strictly one at a time. Cancellation is only observed between deliveries, so
//! a delivery that started processing is always settled before the loop exits.

use crate::{
    channel::{Acknowledger, DeliveryStream},
    dispatcher::{DeliveryOutcome, MessageDispatcher},
};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters reported when the loop ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeStats {
    pub acknowledged: u64,
    pub requeued: u64,
    pub failed: u64,
}

pub(crate) async fn consume<A>(
    mut deliveries: DeliveryStream,
    dispatcher: MessageDispatcher<A>,
    shutdown: CancellationToken,
) -> ConsumeStats
where
    A: Acknowledger + ?Sized,
{
    let mut stats = ConsumeStats::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("consumer cancelled");
                break;
            }
            next = deliveries.next() => next,
        };

        match next {
            Some(Ok(delivery)) => match dispatcher.dispatch(delivery).await {
                Ok(DeliveryOutcome::Acknowledged) => stats.acknowledged += 1,
                Ok(DeliveryOutcome::Requeued) => stats.requeued += 1,
                Err(err) => {
                    stats.failed += 1;
                    error!(error = err.to_string(), "error consume msg");
                }
            },
            Some(Err(err)) => {
                stats.failed += 1;
                error!(error = err.to_string(), "errors consume msg");
            }
            None => {
                warn!("delivery stream closed by the broker");
                break;
            }
        }
    }

    info!(
        acknowledged = stats.acknowledged,
        requeued = stats.requeued,
        failed = stats.failed,
        "consumer stopped"
    );
    stats
}
