// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time-series store client.
//!
//! [`PointWriter`] is the seam between the ingest pipeline and the store.
//! [`InfluxClient`] implements it against the InfluxDB 1.x HTTP API,
//! reusing one HTTP client for the whole process lifetime.

use crate::config::InfluxDbConfig;
use crate::point::{encode_batch, Point};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Timeout applied to every write request.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("InfluxDB rejected write ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Sink for batches of points.
pub trait PointWriter: Send + Sync + 'static {
    /// Write a batch of points.
    fn write_points(&self, points: &[Point])
        -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// InfluxDB 1.x writer over HTTP.
#[derive(Clone)]
pub struct InfluxClient {
    client: reqwest::Client,
    write_url: String,
    database: String,
    username: String,
    password: String,
}

impl InfluxClient {
    /// Build the client once from configuration.
    pub fn new(config: &InfluxDbConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(WRITE_TIMEOUT).build()?;
        Ok(Self {
            client,
            write_url: format!("{}/write", config.base_url()),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Full URL of the write endpoint, without query parameters.
    pub fn write_url(&self) -> &str {
        &self.write_url
    }
}

impl PointWriter for InfluxClient {
    async fn write_points(&self, points: &[Point]) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.write_url)
            .query(&[("db", self.database.as_str()), ("precision", "ns")])
            .basic_auth(&self.username, Some(&self.password))
            .body(encode_batch(points))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(points = points.len(), "wrote batch to InfluxDB");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> InfluxDbConfig {
        InfluxDbConfig {
            host: host.to_string(),
            port: 8086,
            username: "writer".to_string(),
            password: "secret".to_string(),
            database: "telemetry".to_string(),
        }
    }

    #[test]
    fn test_write_url() {
        let client = InfluxClient::new(&config("influx.local")).expect("client");
        assert_eq!(client.write_url(), "http://influx.local:8086/write");

        let client = InfluxClient::new(&config("https://influx.example.com")).expect("client");
        assert_eq!(client.write_url(), "https://influx.example.com:8086/write");
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        // Port 9 (discard) is never contacted for an empty batch.
        let mut cfg = config("127.0.0.1");
        cfg.port = 9;
        let client = InfluxClient::new(&cfg).expect("client");
        client.write_points(&[]).await.expect("empty write");
    }

    #[test]
    fn test_rejected_display() {
        let err = StoreError::Rejected {
            status: 404,
            body: "database not found: \"telemetry\"".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "InfluxDB rejected write (404): database not found: \"telemetry\""
        );
    }
}
