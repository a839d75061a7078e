#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{self, StatusCode},
};
use cellmap::{
    config::{AppConfig, DatabaseConfig},
    error::{Result, ServiceError},
    locator::BoundingBox,
    models::{Antenna, NewSample, SampleRow},
    store::{AntennaCatalog, SampleStore},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration as StdDuration,
};

/// In-memory catalog and sample store with optional insert failure injection.
#[derive(Default)]
pub struct MemoryStore {
    antennas: Vec<Antenna>,
    samples: Mutex<Vec<SampleRow>>,
    fail_after_inserts: Mutex<Option<usize>>,
    inserts: AtomicUsize,
    box_queries: AtomicUsize,
    fallback_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_antennas(antennas: Vec<Antenna>) -> Self {
        Self {
            antennas,
            ..Self::default()
        }
    }

    pub fn with_samples(self, samples: Vec<NewSample>) -> Self {
        {
            let mut rows = self.samples.lock().unwrap();
            for sample in samples {
                let id = rows.len() as i64 + 1;
                rows.push(to_row(id, sample));
            }
        }
        self
    }

    /// Every insert after the first `successes` ones fails.
    pub fn fail_after(&self, successes: usize) {
        *self.fail_after_inserts.lock().unwrap() = Some(successes);
    }

    pub fn heal(&self) {
        *self.fail_after_inserts.lock().unwrap() = None;
    }

    pub fn samples(&self) -> Vec<SampleRow> {
        self.samples.lock().unwrap().clone()
    }

    pub fn fallback_queries(&self) -> usize {
        self.fallback_queries.load(Ordering::SeqCst)
    }
}

fn to_row(id: i64, sample: NewSample) -> SampleRow {
    SampleRow {
        id,
        test_id: sample.test_id,
        cell_id: sample.cell_id,
        download_mbps: sample.download_mbps,
        upload_mbps: sample.upload_mbps,
        latency_ms: sample.latency_ms,
        jitter_ms: sample.jitter_ms,
        network_type: sample.network_type,
        signal_strength_dbm: sample.signal_strength_dbm,
        operator: sample.operator,
        device_type: sample.device_type,
        wilaya: sample.wilaya,
        commune: sample.commune,
        latitude: sample.latitude,
        longitude: sample.longitude,
        timestamp: sample.timestamp,
    }
}

#[async_trait]
impl AntennaCatalog for MemoryStore {
    async fn antennas_in_box(&self, bounds: &BoundingBox) -> Result<Vec<Antenna>> {
        self.box_queries.fetch_add(1, Ordering::SeqCst);
        self.antennas.antennas_in_box(bounds).await
    }

    async fn antennas_up_to(&self, limit: i64) -> Result<Vec<Antenna>> {
        self.fallback_queries.fetch_add(1, Ordering::SeqCst);
        self.antennas.antennas_up_to(limit).await
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn insert_sample(&self, sample: &NewSample) -> Result<()> {
        if let Some(limit) = *self.fail_after_inserts.lock().unwrap() {
            if self.inserts.load(Ordering::SeqCst) >= limit {
                return Err(ServiceError::Storage(anyhow::anyhow!("insert rejected")));
            }
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);

        let mut rows = self.samples.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(to_row(id, sample.clone()));
        Ok(())
    }

    async fn max_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .samples
            .lock()
            .unwrap()
            .iter()
            .map(|row| row.timestamp)
            .max())
    }

    async fn samples_newer_than(&self, watermark: DateTime<Utc>) -> Result<Vec<SampleRow>> {
        let mut rows: Vec<SampleRow> = self
            .samples
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.timestamp > watermark)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.timestamp, row.id));
        Ok(rows)
    }
}

pub fn antenna(name: &str, lat: f64, lon: f64) -> Antenna {
    Antenna {
        id: 0,
        nom: Some(name.to_string()),
        latitude: lat,
        longitude: lon,
        wilaya: Some("Alger".into()),
        commune: Some("Sidi M'Hamed".into()),
        cell_id_a: Some(format!("{name}-A")),
        cell_id_b: Some(format!("{name}-B")),
        cell_id_c: Some(format!("{name}-C")),
    }
}

pub fn at_minute(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(minute)
}

pub fn sample(test_id: &str, minute: i64, position: Option<(f64, f64)>) -> NewSample {
    NewSample {
        test_id: Some(test_id.to_string()),
        cell_id: None,
        download_mbps: Some(42.0),
        upload_mbps: Some(12.5),
        latency_ms: Some(31.0),
        jitter_ms: Some(4.0),
        network_type: Some("4G".into()),
        signal_strength_dbm: Some(-91),
        operator: Some("Mobilis".into()),
        device_type: Some("Android".into()),
        wilaya: None,
        commune: None,
        latitude: position.map(|(lat, _)| lat),
        longitude: position.map(|(_, lon)| lon),
        timestamp: at_minute(minute),
    }
}

pub fn test_config(api_key: Option<&str>) -> AppConfig {
    AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database: DatabaseConfig {
            url: "postgres://cellmap@localhost/cellmap".into(),
            max_pool_size: 1,
            ssl_root_cert: None,
            ssl_cert: None,
            ssl_key: None,
        },
        api_key: api_key.map(str::to_string),
        allowed_origins: None,
        request_timeout: StdDuration::from_secs(30),
        max_body_bytes: 1024 * 1024,
        max_download_bytes: 4 * 1024 * 1024,
    }
}

pub async fn read_json(response: http::Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    let value =
        serde_json::from_slice::<Value>(&bytes).expect("response body should be valid JSON");
    (status, value)
}
