// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Input Lifecycle
//!
//! `AmqpInput::start` performs the startup sequence and hands back a
//! `RunningInput`:
//!
//! 1. validate the configuration and resolve the payload parser
//! 2. open the connection and its channel
//! 3. declare the queue and apply the exchange binding
//! 4. subscribe in manual acknowledgment mode and spawn the subscription loop
//!
//! Any failure aborts the start; a session opened along the way is closed again.

use crate::{
    channel::{BrokerChannel, ConnectionFactory, ConnectionManager, LapinConnectionFactory},
    config::ConnectorConfig,
    consumer::{consume, ConsumeStats},
    dispatcher::MessageDispatcher,
    errors::AmqpError,
    payload::ParserRegistry,
    queue::Queue,
    router::Router,
    topology::AmqpTopology,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Connection name reported to the broker.
pub const CONNECTION_NAME: &str = "amqp-input";

/// An input that has not been started yet.
pub struct AmqpInput {
    config: ConnectorConfig,
    manager: ConnectionManager,
    router: Arc<dyn Router>,
    parsers: ParserRegistry,
}

impl AmqpInput {
    /// An input connecting through lapin.
    pub fn new(config: ConnectorConfig, router: Arc<dyn Router>) -> Self {
        AmqpInput::with_factory(config, Arc::new(LapinConnectionFactory), router)
    }

    /// An input connecting through `factory`.
    ///
    /// # Parameters
    /// * `config` - Validated input configuration
    /// * `factory` - Opens the broker session
    /// * `router` - Downstream receiving the records
    ///
    /// # Returns
    /// A new input using the default parser registry
    pub fn with_factory(
        config: ConnectorConfig,
        factory: Arc<dyn ConnectionFactory>,
        router: Arc<dyn Router>,
    ) -> Self {
        AmqpInput {
            config,
            manager: ConnectionManager::new(factory, CONNECTION_NAME),
            router,
            parsers: ParserRegistry::default(),
        }
    }

    /// Replaces the default parser registry.
    pub fn parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Connects, installs the topology and starts consuming.
    ///
    /// # Returns
    /// The running input, or the first startup fault
    pub async fn start(self) -> Result<RunningInput, AmqpError> {
        self.config.validate()?;
        let payload = self
            .parsers
            .resolver(self.config.payload_format.as_deref())?;

        let channel = self.manager.start(&self.config).await?;

        let subscribed = async {
            let queue = AmqpTopology::new(channel.clone())
                .install(&self.config.queue, self.config.binding.as_ref())
                .await?;

            let consumer_tag = format!("{}-{}", CONNECTION_NAME, Uuid::new_v4());
            let deliveries = channel.consume(&queue.name, &consumer_tag).await?;
            info!(queue = %queue.name, consumer_tag, "consuming");

            Ok::<_, AmqpError>((queue, deliveries))
        }
        .await;

        let (queue, deliveries) = match subscribed {
            Ok(subscribed) => subscribed,
            Err(err) => {
                if let Err(close_err) = self.manager.stop(channel.as_ref()).await {
                    error!(error = close_err.to_string(), "error closing after failed start");
                }
                return Err(err);
            }
        };

        let dispatcher = MessageDispatcher::new(
            channel.clone(),
            self.router,
            payload,
            self.config.tag.clone(),
            self.config.time.clone(),
        )
        .queue_name(&queue.name)
        .binding(self.config.binding.clone());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(consume(deliveries, dispatcher, shutdown.clone()));

        Ok(RunningInput {
            queue,
            channel,
            manager: self.manager,
            shutdown,
            task: Some(task),
            stats: None,
        })
    }
}

/// A started input, consuming until shut down or until the broker closes the
/// subscription.
pub struct RunningInput {
    queue: Queue,
    channel: Arc<dyn BrokerChannel>,
    manager: ConnectionManager,
    shutdown: CancellationToken,
    task: Option<JoinHandle<ConsumeStats>>,
    stats: Option<ConsumeStats>,
}

impl RunningInput {
    /// The queue as declared by the broker.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Resolves once the subscription loop has ended on its own. Cancel safe.
    pub async fn closed(&mut self) -> ConsumeStats {
        self.join().await
    }

    /// Stops consuming, waits for the in-flight delivery to be settled, then
    /// closes the channel and the connection.
    pub async fn shutdown(mut self) -> Result<ConsumeStats, AmqpError> {
        self.shutdown.cancel();
        let stats = self.join().await;

        self.manager.stop(self.channel.as_ref()).await?;
        Ok(stats)
    }

    async fn join(&mut self) -> ConsumeStats {
        if let Some(task) = self.task.as_mut() {
            let stats = match task.await {
                Ok(stats) => stats,
                Err(err) => {
                    error!(error = err.to_string(), "consumer task failed");
                    ConsumeStats::default()
                }
            };
            self.task = None;
            self.stats = Some(stats);
        }

        self.stats.unwrap_or_default()
    }
}
