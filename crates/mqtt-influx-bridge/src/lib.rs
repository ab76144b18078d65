// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT to InfluxDB Sensor Bridge
//!
//! Subscribes to one MQTT topic, decodes each payload as a sensor reading
//! and writes it to InfluxDB as a point in the `sensors` measurement.
//!
//! This crate provides:
//! - Environment-based configuration, validated once at startup
//! - A single fallible decode/validate step for sensor payloads
//! - InfluxDB Line Protocol encoding
//! - An InfluxDB 1.x HTTP writer reusing one long-lived client
//! - The MQTT connection lifecycle with a bounded receive queue
//!
//! # Overview
//!
//! ```text
//! MQTT publish --> queue --> SensorReading --> Point --> InfluxClient
//! ```
//!
//! # Payload
//!
//! ```json
//! {"time_read": 1700000000, "temperature": 21.5, "humidity": 40.2,
//!  "uptime": {"seconds": 3600}, "sensor": {"id": "kitchen"}}
//! ```
//!
//! becomes
//!
//! ```text
//! sensors,id=kitchen temp=21.5,humidity=40.2,uptime=3600i,time_of_read=1700000000i 1700000000000000000
//! ```

pub mod bridge;
pub mod config;
pub mod pipeline;
pub mod point;
pub mod reading;
pub mod store;

pub use bridge::{Bridge, BridgeError, BridgeHandle, InboundMessage};
pub use config::{BridgeConfig, ConfigError, InfluxDbConfig, MqttConfig};
pub use pipeline::{IngestPipeline, Outcome, PipelineStats, PipelineStatsSnapshot};
pub use point::{FieldValue, Point, MEASUREMENT};
pub use reading::{ReadingError, SensorReading};
pub use store::{InfluxClient, PointWriter, StoreError};
