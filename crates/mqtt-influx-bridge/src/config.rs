// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Environment-based configuration for the bridge.
//!
//! All connection parameters come from the process environment and are
//! validated once at startup. The resulting [`BridgeConfig`] is immutable
//! and handed explicitly to the broker connection and the store client.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Variables required for the MQTT connection, in check order.
pub const MQTT_VARS: &[&str] = &["MQTT_USER", "MQTT_PASS", "MQTT_SERVER", "MQTT_TOPIC"];

/// Variables required for the InfluxDB connection, in check order.
pub const INFLUXDB_VARS: &[&str] = &[
    "INFLUXDB_HOST",
    "INFLUXDB_PORT",
    "INFLUXDB_USER",
    "INFLUXDB_PASS",
    "INFLUXDB_DBNAME",
];

const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_CLIENT_ID: &str = "mqtt-to-influxdb";
const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Error while trying to get environment variable {name}. \
         The following variables must be defined: {}",
        .required.join(" ")
    )]
    Missing {
        name: &'static str,
        required: &'static [&'static str],
    },

    #[error("Invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Time-series store connection settings.
    pub influxdb: InfluxDbConfig,
}

/// MQTT broker connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct MqttConfig {
    /// Broker host name or address.
    pub server: String,
    /// Broker TCP port.
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Topic filter to subscribe to.
    pub topic: String,
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval negotiated with the broker.
    pub keep_alive: Duration,
}

/// InfluxDB 1.x connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct InfluxDbConfig {
    /// Host name, optionally with an `http://` or `https://` scheme.
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Target database.
    pub database: String,
}

impl fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("topic", &self.topic)
            .field("client_id", &self.client_id)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

impl fmt::Debug for InfluxDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl InfluxDbConfig {
    /// Base URL of the InfluxDB HTTP API.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Required variables are checked group by group (MQTT first), and the
    /// first absent one is reported together with its whole group.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Check order follows MQTT_VARS then INFLUXDB_VARS.
        let mqtt_user = required(&lookup, "MQTT_USER", MQTT_VARS)?;
        let mqtt_pass = required(&lookup, "MQTT_PASS", MQTT_VARS)?;
        let mqtt_server = required(&lookup, "MQTT_SERVER", MQTT_VARS)?;
        let mqtt_topic = required(&lookup, "MQTT_TOPIC", MQTT_VARS)?;
        let influx_host = required(&lookup, "INFLUXDB_HOST", INFLUXDB_VARS)?;
        let influx_port = required(&lookup, "INFLUXDB_PORT", INFLUXDB_VARS)?;
        let influx_user = required(&lookup, "INFLUXDB_USER", INFLUXDB_VARS)?;
        let influx_pass = required(&lookup, "INFLUXDB_PASS", INFLUXDB_VARS)?;
        let influx_db = required(&lookup, "INFLUXDB_DBNAME", INFLUXDB_VARS)?;

        let mqtt = MqttConfig {
            server: mqtt_server,
            port: optional_parsed(&lookup, "MQTT_PORT")?.unwrap_or(DEFAULT_MQTT_PORT),
            username: mqtt_user,
            password: mqtt_pass,
            topic: mqtt_topic,
            client_id: lookup("MQTT_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            keep_alive: Duration::from_secs(
                optional_parsed(&lookup, "MQTT_KEEP_ALIVE_SECS")?
                    .unwrap_or(DEFAULT_KEEP_ALIVE_SECS),
            ),
        };

        let influxdb = InfluxDbConfig {
            host: influx_host,
            port: parse_value("INFLUXDB_PORT", &influx_port)?,
            username: influx_user,
            password: influx_pass,
            database: influx_db,
        };

        Ok(Self { mqtt, influxdb })
    }
}

fn required<F>(
    lookup: &F,
    name: &'static str,
    group: &'static [&'static str],
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or(ConfigError::Missing {
        name,
        required: group,
    })
}

fn optional_parsed<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    lookup(name).map(|raw| parse_value(name, &raw)).transpose()
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            name,
            reason: format!("'{}' ({})", raw, e),
        })
}
