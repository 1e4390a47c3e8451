//! Metrics collection and export for Tandem.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use async_trait::async_trait;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tandem_core::{HubHandle, MessageStore, StoreError};
use tandem_protocol::ChatMessage;
use tandem_transport::Disconnect;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "tandem_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "tandem_connections_active";
    pub const DISCONNECTS_TOTAL: &str = "tandem_disconnects_total";
    pub const MESSAGES_TOTAL: &str = "tandem_messages_total";
    pub const MESSAGES_BYTES: &str = "tandem_messages_bytes";
    pub const HUB_CLIENTS: &str = "tandem_hub_clients";
    pub const HUB_ROOMS: &str = "tandem_hub_rooms";
    pub const HUB_EVICTIONS_TOTAL: &str = "tandem_hub_evictions_total";
    pub const REJECTIONS_TOTAL: &str = "tandem_rejections_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::DISCONNECTS_TOTAL, "Disconnections by reason");
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Messages by direction");
    metrics::describe_counter!(names::MESSAGES_BYTES, "Message bytes by direction");
    metrics::describe_gauge!(names::HUB_CLIENTS, "Clients registered with the hub");
    metrics::describe_gauge!(names::HUB_ROOMS, "Non-empty rooms");
    metrics::describe_counter!(
        names::HUB_EVICTIONS_TOTAL,
        "Clients evicted for a full mailbox"
    );
    metrics::describe_counter!(names::REJECTIONS_TOTAL, "Rejected upgrade requests");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record why a client stopped.
pub fn record_disconnect_reason(reason: &Disconnect) {
    counter!(names::DISCONNECTS_TOTAL, "reason" => reason.label()).increment(1);
}

/// Record a message.
pub fn record_message(bytes: usize, direction: &'static str) {
    counter!(names::MESSAGES_TOTAL, "direction" => direction).increment(1);
    counter!(names::MESSAGES_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record a rejected upgrade.
pub fn record_rejection(status: u16) {
    counter!(names::REJECTIONS_TOTAL, "status" => status.to_string()).increment(1);
}

/// Periodically publish hub statistics.
pub fn spawn_hub_reporter(hub: HubHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let Ok(stats) = hub.stats().await else {
                debug!("Hub stopped, ending stats reporter");
                return;
            };
            gauge!(names::HUB_CLIENTS).set(stats.clients as f64);
            gauge!(names::HUB_ROOMS).set(stats.rooms as f64);
            counter!(names::HUB_EVICTIONS_TOTAL).absolute(stats.evictions);
            counter!(names::MESSAGES_TOTAL, "direction" => "outbound").absolute(stats.delivered);
        }
    })
}

/// A store that counts the chat messages passing through it.
pub struct MeteredStore<S> {
    inner: S,
}

impl<S> MeteredStore<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: MessageStore> MessageStore for MeteredStore<S> {
    async fn save_message(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let message = self.inner.save_message(room_id, sender_id, content).await?;
        record_message(content.len(), "inbound");
        Ok(message)
    }

    async fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.inner.recent_messages(room_id, limit).await
    }
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
