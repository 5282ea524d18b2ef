//! Connecting to NATS and provisioning JetStream resources.

use async_nats::jetstream::context::{GetStreamError, GetStreamErrorKind};
use async_nats::jetstream::{self, kv, stream};
use promptgate_core::{Error, Result};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::NatsConfig;
use crate::health::HealthCheck;
use crate::metrics::NatsMetrics;
use crate::queue::NatsTaskQueue;
use crate::store::NatsKvStore;

pub(crate) fn unavailable(context: &str, err: impl std::fmt::Display) -> Error {
    Error::StoreUnavailable(format!("{}: {}", context, err))
}

fn is_stream_not_found(err: &GetStreamError) -> bool {
    matches!(
        err.kind(),
        GetStreamErrorKind::JetStream(e) if e.error_code() == jetstream::ErrorCode::STREAM_NOT_FOUND
    )
}

/// A live NATS connection with JetStream enabled.
#[derive(Clone)]
pub struct NatsBackend {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
    metrics: Arc<NatsMetrics>,
}

impl NatsBackend {
    /// Connect with default settings to a single server.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(NatsConfig::new(url)).await
    }

    pub async fn connect_with_config(config: NatsConfig) -> Result<Self> {
        let urls = config.server_list();
        info!(urls = %urls, "Connecting to NATS");

        let metrics = NatsMetrics::new();

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(config.connection_timeout())
            .request_timeout(Some(config.request_timeout()))
            .retry_on_initial_connect()
            .connect(urls.as_str())
            .await
            .map_err(|e| unavailable("Failed to connect to NATS", e))?;

        metrics.set_connected(true);
        let jetstream = jetstream::new(client.clone());

        info!("Connected to NATS and initialized JetStream");

        Ok(Self {
            client,
            jetstream,
            config,
            metrics,
        })
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<NatsMetrics> {
        &self.metrics
    }

    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    pub fn health_check(&self) -> HealthCheck {
        HealthCheck::evaluate(self.metrics.snapshot(), self.is_connected())
    }

    /// Open the KV bucket, creating it on first use.
    pub async fn open_store(&self) -> Result<NatsKvStore> {
        // Look the backing stream up first: `get_key_value` reports a missing
        // bucket and a failed request as the same error kind.
        let exists = match self
            .jetstream
            .get_stream(format!("KV_{}", self.config.bucket))
            .await
        {
            Ok(_) => true,
            Err(e) if is_stream_not_found(&e) => false,
            Err(e) => return Err(unavailable("Failed to look up KV bucket", e)),
        };

        let bucket = if exists {
            self.jetstream
                .get_key_value(&self.config.bucket)
                .await
                .map_err(|e| unavailable("Failed to open KV bucket", e))?
        } else {
            self.jetstream
                .create_key_value(kv::Config {
                    bucket: self.config.bucket.clone(),
                    description: "promptgate cache entries and job records".to_string(),
                    history: 1,
                    max_age: self.config.max_age(),
                    storage: stream::StorageType::File,
                    ..Default::default()
                })
                .await
                .map_err(|e| unavailable("Failed to create KV bucket", e))?
        };

        info!(bucket = %self.config.bucket, "KV bucket ready");
        Ok(NatsKvStore::new(
            bucket,
            self.client.clone(),
            self.metrics.clone(),
        ))
    }

    /// Open the job stream and its durable consumer, creating them on first
    /// use. Job records are kept in `store`.
    pub async fn open_queue(&self, store: Arc<NatsKvStore>) -> Result<NatsTaskQueue> {
        let stream = self
            .jetstream
            .get_or_create_stream(stream::Config {
                name: self.config.stream_name.clone(),
                subjects: vec![self.config.subject.clone()],
                retention: stream::RetentionPolicy::WorkQueue,
                max_age: self.config.max_age(),
                duplicate_window: self.config.duplicate_window(),
                storage: stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| unavailable("Failed to create job stream", e))?;

        let consumer = stream
            .get_or_create_consumer(
                &self.config.consumer_name,
                jetstream::consumer::pull::Config {
                    durable_name: Some(self.config.consumer_name.clone()),
                    filter_subject: self.config.subject.clone(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: self.config.ack_wait(),
                    // Redelivery is bounded by the worker's attempt limit.
                    max_deliver: -1,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| unavailable("Failed to create job consumer", e))?;

        info!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_name,
            "Job stream ready"
        );

        Ok(NatsTaskQueue::new(
            self.jetstream.clone(),
            consumer,
            store,
            self.config.subject.clone(),
            self.metrics.clone(),
        ))
    }

    /// Drain the connection, letting in-flight requests finish.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Draining NATS connection");
        if let Err(e) = self.client.drain().await {
            error!(error = %e, "Error draining NATS connection");
        }
        self.metrics.set_connected(false);
        Ok(())
    }
}
