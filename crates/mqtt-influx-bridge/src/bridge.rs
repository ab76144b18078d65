// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT connection lifecycle.
//!
//! The bridge owns two tasks:
//!
//! - the event loop task polls the MQTT connection and forwards every
//!   publish into a bounded queue,
//! - the writer task owns the [`IngestPipeline`] and drains that queue in
//!   arrival order.
//!
//! Keeping store writes off the event loop lets the MQTT client keep
//! answering keep-alives while a write is in flight.

use crate::config::MqttConfig;
use crate::pipeline::{IngestPipeline, PipelineStats, PipelineStatsSnapshot};
use crate::store::PointWriter;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the queue between the event loop and the writer.
pub const QUEUE_CAPACITY: usize = 64;

/// Capacity of the rumqttc request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Pause between failed polls while the client reconnects.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long shutdown waits for the DISCONNECT to go out.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bridge errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("MQTT connection failed: {0}")]
    Connect(#[from] rumqttc::ConnectionError),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Bridge task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// What the event loop does with a polled event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LoopEvent {
    /// Forward to the writer.
    Message(InboundMessage),
    /// A (re)connection was acknowledged.
    Connected,
    /// Our DISCONNECT went out.
    Disconnected,
    Other,
}

impl From<Event> for LoopEvent {
    fn from(event: Event) -> Self {
        match event {
            Event::Incoming(Packet::Publish(publish)) => LoopEvent::Message(InboundMessage {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            }),
            Event::Incoming(Packet::ConnAck(_)) => LoopEvent::Connected,
            Event::Outgoing(Outgoing::Disconnect) => LoopEvent::Disconnected,
            _ => LoopEvent::Other,
        }
    }
}

/// MQTT-to-store bridge.
pub struct Bridge {
    config: MqttConfig,
}

impl Bridge {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    /// Client options derived from configuration.
    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.server.clone(),
            self.config.port,
        );
        options
            .set_credentials(self.config.username.clone(), self.config.password.clone())
            .set_keep_alive(self.config.keep_alive)
            .set_clean_session(true);
        options
    }

    /// Connect, subscribe and start forwarding messages into `pipeline`.
    ///
    /// Returns once the broker has acknowledged the connection. A refused
    /// or unreachable broker is reported here, before any subscription.
    pub async fn start<W: PointWriter>(
        self,
        pipeline: IngestPipeline<W>,
    ) -> Result<BridgeHandle, BridgeError> {
        let (client, mut eventloop) = AsyncClient::new(self.mqtt_options(), REQUEST_CHANNEL_CAPACITY);

        tracing::info!(
            server = %self.config.server,
            port = self.config.port,
            client_id = %self.config.client_id,
            "connecting to MQTT broker"
        );
        wait_for_connack(&mut eventloop).await?;

        client
            .subscribe(self.config.topic.clone(), QoS::AtMostOnce)
            .await?;
        tracing::info!(topic = %self.config.topic, "subscribed");

        let running = Arc::new(AtomicBool::new(true));
        let stats = pipeline.stats();
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        let writer_task = tokio::spawn(run_writer(pipeline, rx));
        let loop_task = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            self.config.topic,
            tx,
            running.clone(),
        ));

        Ok(BridgeHandle {
            client,
            running,
            stats,
            loop_task,
            writer_task,
        })
    }
}

/// Handle to a running bridge.
pub struct BridgeHandle {
    client: AsyncClient,
    running: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
    loop_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl BridgeHandle {
    /// Check if the bridge is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.loop_task.is_finished()
    }

    /// Shared pipeline statistics.
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Stop receiving, disconnect from the broker, and let the writer
    /// drain already queued messages.
    pub async fn shutdown(mut self) -> Result<PipelineStatsSnapshot, BridgeError> {
        self.running.store(false, Ordering::Relaxed);

        if let Err(err) = self.client.try_disconnect() {
            tracing::debug!(error = %err, "disconnect request not queued");
            self.loop_task.abort();
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.loop_task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.is_cancelled() => {}
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                tracing::warn!("MQTT event loop did not stop in time, aborting");
                self.loop_task.abort();
            }
        }

        // The event loop owned the queue sender; the writer ends once drained.
        self.writer_task.await?;

        let snapshot = self.stats.snapshot();
        tracing::info!(
            received = snapshot.messages_received,
            written = snapshot.points_written,
            invalid = snapshot.messages_invalid,
            write_errors = snapshot.write_errors,
            "bridge stopped"
        );
        Ok(snapshot)
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), BridgeError> {
    loop {
        match LoopEvent::from(eventloop.poll().await?) {
            LoopEvent::Connected => {
                tracing::info!("connected to MQTT broker");
                return Ok(());
            }
            _ => continue,
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topic: String,
    tx: mpsc::Sender<InboundMessage>,
    running: Arc<AtomicBool>,
) {
    loop {
        match eventloop.poll().await {
            Ok(event) => match LoopEvent::from(event) {
                LoopEvent::Message(msg) => {
                    if tx.send(msg).await.is_err() {
                        tracing::error!("ingest queue closed, stopping event loop");
                        break;
                    }
                }
                LoopEvent::Connected => {
                    // Clean sessions drop subscriptions on reconnect
                    tracing::info!(topic = %topic, "reconnected to MQTT broker, resubscribing");
                    if let Err(err) = client.try_subscribe(topic.clone(), QoS::AtMostOnce) {
                        tracing::error!(error = %err, "resubscribe failed");
                    }
                }
                LoopEvent::Disconnected => {
                    tracing::info!("disconnected from MQTT broker");
                    break;
                }
                LoopEvent::Other => {}
            },
            Err(err) => {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                tracing::warn!(error = %err, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
    running.store(false, Ordering::Relaxed);
}

async fn run_writer<W: PointWriter>(
    pipeline: IngestPipeline<W>,
    mut rx: mpsc::Receiver<InboundMessage>,
) {
    while let Some(msg) = rx.recv().await {
        pipeline.handle_message(&msg.topic, &msg.payload).await;
    }
    tracing::debug!("ingest queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};

    fn mqtt_config() -> MqttConfig {
        MqttConfig {
            server: "broker.local".to_string(),
            port: 1884,
            username: "bridge".to_string(),
            password: "secret".to_string(),
            topic: "home/+/climate".to_string(),
            client_id: "bridge-test".to_string(),
            keep_alive: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_mqtt_options() {
        let options = Bridge::new(mqtt_config()).mqtt_options();

        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.client_id(), "bridge-test");
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(options.clean_session());
    }

    #[test]
    fn test_publish_becomes_message() {
        let event = Event::Incoming(Packet::Publish(Publish::new(
            "home/kitchen/climate",
            QoS::AtMostOnce,
            b"{\"a\":1}".to_vec(),
        )));

        assert_eq!(
            LoopEvent::from(event),
            LoopEvent::Message(InboundMessage {
                topic: "home/kitchen/climate".to_string(),
                payload: b"{\"a\":1}".to_vec(),
            })
        );
    }

    #[test]
    fn test_connack_and_disconnect_events() {
        let connack = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        }));
        assert_eq!(LoopEvent::from(connack), LoopEvent::Connected);

        assert_eq!(
            LoopEvent::from(Event::Outgoing(Outgoing::Disconnect)),
            LoopEvent::Disconnected
        );
        assert_eq!(
            LoopEvent::from(Event::Incoming(Packet::PingResp)),
            LoopEvent::Other
        );
    }
}
