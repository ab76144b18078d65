// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT to InfluxDB Sensor Bridge
//!
//! # Usage
//!
//! ```bash
//! export MQTT_USER=bridge MQTT_PASS=secret MQTT_SERVER=broker.local MQTT_TOPIC='home/+/climate'
//! export INFLUXDB_HOST=influx.local INFLUXDB_PORT=8086 INFLUXDB_USER=writer \
//!        INFLUXDB_PASS=secret INFLUXDB_DBNAME=telemetry
//! RUST_LOG=info mqtt-influx-bridge
//! ```
//!
//! Optional: `MQTT_PORT` (1883), `MQTT_CLIENT_ID` (mqtt-to-influxdb),
//! `MQTT_KEEP_ALIVE_SECS` (60).

use mqtt_influx_bridge::{
    Bridge, BridgeConfig, InfluxClient, IngestPipeline, PipelineStatsSnapshot,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Reported before logging is set up so RUST_LOG cannot hide it.
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(?config, "configuration loaded");

    let store = InfluxClient::new(&config.influxdb)?;
    tracing::info!(url = store.write_url(), database = %config.influxdb.database, "InfluxDB writer ready");

    let pipeline = IngestPipeline::new(store);
    let handle = Bridge::new(config.mqtt.clone()).start(pipeline).await?;

    let stats = handle.stats();
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            log_stats(&stats.snapshot());
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down");
        }
        _ = wait_stopped(&handle) => {
            tracing::error!("MQTT event loop ended unexpectedly");
        }
    }

    stats_task.abort();
    let snapshot = handle.shutdown().await?;
    log_stats(&snapshot);

    Ok(())
}

async fn wait_stopped(handle: &mqtt_influx_bridge::BridgeHandle) {
    while handle.is_running() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

fn log_stats(stats: &PipelineStatsSnapshot) {
    tracing::info!(
        received = stats.messages_received,
        written = stats.points_written,
        invalid = stats.messages_invalid,
        write_errors = stats.write_errors,
        msg_per_sec = stats.messages_per_second(),
        "pipeline statistics"
    );
}
