// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message-to-point ingest pipeline.
//!
//! Each inbound message is handled independently:
//!
//! ```text
//! payload --> SensorReading::parse --> Point::from_reading --> PointWriter::write_points
//! ```
//!
//! Invalid payloads and failed writes are logged, counted and dropped.
//! Neither stops the pipeline from handling the next message.

use crate::point::Point;
use crate::reading::{ReadingError, SensorReading};
use crate::store::{PointWriter, StoreError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Result of handling one message.
#[derive(Debug)]
pub enum Outcome {
    /// The point was accepted by the store.
    Written(Point),
    /// The payload was rejected; nothing was written.
    Invalid(ReadingError),
    /// The store write failed; the point is lost.
    WriteFailed(StoreError),
}

impl Outcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Outcome::Written(_))
    }
}

/// Pipeline counters.
#[derive(Debug)]
pub struct PipelineStats {
    /// Messages received from the broker.
    pub messages_received: AtomicU64,
    /// Points accepted by the store.
    pub points_written: AtomicU64,
    /// Messages dropped by decoding or validation.
    pub messages_invalid: AtomicU64,
    /// Writes that failed.
    pub write_errors: AtomicU64,
    /// Pipeline creation time.
    pub created: Instant,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            points_written: AtomicU64::new(0),
            messages_invalid: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            points_written: self.points_written.load(Ordering::Relaxed),
            messages_invalid: self.messages_invalid.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pipeline statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub messages_received: u64,
    pub points_written: u64,
    pub messages_invalid: u64,
    pub write_errors: u64,
    pub uptime_secs: u64,
}

impl PipelineStatsSnapshot {
    /// Calculate messages per second.
    pub fn messages_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.messages_received as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}

/// Turns broker messages into store writes.
pub struct IngestPipeline<W> {
    writer: W,
    stats: Arc<PipelineStats>,
}

impl<W: PointWriter> IngestPipeline<W> {
    /// Create a pipeline around a long-lived store writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stats: Arc::new(PipelineStats::new()),
        }
    }

    /// Shared statistics handle.
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Decode a payload and build its point, without writing anything.
    pub fn prepare(payload: &[u8]) -> Result<Point, ReadingError> {
        SensorReading::parse(payload).map(|reading| Point::from_reading(&reading))
    }

    /// Handle one inbound message.
    ///
    /// Never fails: invalid payloads and write errors are logged and
    /// reported through the returned [`Outcome`].
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> Outcome {
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        let text = String::from_utf8_lossy(payload);
        tracing::info!(topic, payload = %text, "message received");

        let point = match Self::prepare(payload) {
            Ok(point) => point,
            Err(err) => {
                self.stats.messages_invalid.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(topic, payload = %text, error = %err, "dropping invalid message");
                return Outcome::Invalid(err);
            }
        };

        match self.writer.write_points(std::slice::from_ref(&point)).await {
            Ok(()) => {
                self.stats.points_written.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(topic, time_ns = point.time_ns, "point written");
                Outcome::Written(point)
            }
            Err(err) => {
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(topic, time_ns = point.time_ns, error = %err, "point write failed");
                Outcome::WriteFailed(err)
            }
        }
    }
}
