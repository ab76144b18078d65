// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fakes for integration tests.

#![allow(dead_code)] // Not every test binary uses every helper

use mqtt_influx_bridge::{Point, PointWriter, StoreError};
use std::sync::{Arc, Mutex};

/// Scenario A payload.
pub const KITCHEN_PAYLOAD: &str = r#"{"time_read": 1700000000, "temperature": 21.5, "humidity": 40.2, "uptime": {"seconds": 3600}, "sensor": {"id": "kitchen"}}"#;

/// Writer that records every batch it is handed.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    batches: Arc<Mutex<Vec<Vec<Point>>>>,
}

impl RecordingWriter {
    pub fn batches(&self) -> Vec<Vec<Point>> {
        self.batches.lock().expect("lock").clone()
    }

    pub fn write_calls(&self) -> usize {
        self.batches.lock().expect("lock").len()
    }
}

impl PointWriter for RecordingWriter {
    async fn write_points(&self, points: &[Point]) -> Result<(), StoreError> {
        self.batches.lock().expect("lock").push(points.to_vec());
        Ok(())
    }
}

/// Writer that rejects the first `failures` writes, then records.
#[derive(Clone, Default)]
pub struct FlakyWriter {
    remaining_failures: Arc<Mutex<usize>>,
    inner: RecordingWriter,
}

impl FlakyWriter {
    pub fn failing(failures: usize) -> Self {
        Self {
            remaining_failures: Arc::new(Mutex::new(failures)),
            inner: RecordingWriter::default(),
        }
    }

    pub fn recorded(&self) -> &RecordingWriter {
        &self.inner
    }
}

impl PointWriter for FlakyWriter {
    async fn write_points(&self, points: &[Point]) -> Result<(), StoreError> {
        let fail = {
            let mut remaining = self.remaining_failures.lock().expect("lock");
            if *remaining > 0 {
                *remaining -= 1;
                true
            } else {
                false
            }
        };
        if fail {
            return Err(StoreError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        self.inner.write_points(points).await
    }
}
