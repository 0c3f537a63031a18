//! Liveness probe against the resolved cache.
//!
//! Each check acquires its own client handle, sends a single PING and
//! releases the handle on every exit path. Handles are never pooled: after a
//! failover the next pass simply builds a fresh one.

use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use tracing::{debug, instrument, warn};

use super::connection::ConnectionDescriptor;
use super::error::ProbeError;

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for a single command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// A live client handle to the cache.
#[async_trait]
pub trait CacheHandle: Send + Sync {
    /// Issue a liveness probe.
    async fn ping(&self) -> Result<(), ProbeError>;

    /// Close the handle. Called exactly once per handle.
    async fn release(self: Box<Self>);
}

/// Builds client handles for a descriptor's schema.
#[async_trait]
pub trait CacheConnector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn CacheHandle>, ProbeError>;
}

/// Probe the cache described by `descriptor`.
///
/// Returns the client error text verbatim on failure.
#[instrument(skip_all, fields(endpoint = %descriptor.redacted_url()))]
pub async fn check<C>(connector: &C, descriptor: &ConnectionDescriptor) -> Result<(), ProbeError>
where
    C: CacheConnector + ?Sized,
{
    let handle = connector.connect(descriptor).await?;
    let outcome = handle.ping().await;
    handle.release().await;

    match &outcome {
        Ok(()) => debug!("Redis answered PING"),
        Err(e) => warn!(error = %e, "Redis liveness probe failed"),
    }
    outcome
}

/// [`CacheConnector`] backed by the `fred` client.
#[derive(Clone, Debug)]
pub struct FredConnector {
    connection_timeout: Duration,
    command_timeout: Duration,
}

impl Default for FredConnector {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl FredConnector {
    pub fn new(connection_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            connection_timeout,
            command_timeout,
        }
    }
}

#[async_trait]
impl CacheConnector for FredConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn CacheHandle>, ProbeError> {
        let config = descriptor
            .client_config()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        let command_timeout = self.command_timeout;
        let connection_timeout = self.connection_timeout;

        // Building the client does not touch the network; the connection is
        // established by the probe itself.
        let client = Builder::from_config(config)
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .with_connection_config(|conn| {
                conn.connection_timeout = connection_timeout;
            })
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Box::new(FredHandle { client }))
    }
}

struct FredHandle {
    client: Client,
}

#[async_trait]
impl CacheHandle for FredHandle {
    async fn ping(&self) -> Result<(), ProbeError> {
        self.client
            .init()
            .await
            .map_err(|e| ProbeError::Ping(e.to_string()))?;
        let _: String = self
            .client
            .ping(None)
            .await
            .map_err(|e| ProbeError::Ping(e.to_string()))?;
        Ok(())
    }

    async fn release(self: Box<Self>) {
        if !self.client.is_connected() {
            return;
        }
        if let Err(e) = self.client.quit().await {
            debug!(error = %e, "Failed to close redis client");
        }
    }
}
