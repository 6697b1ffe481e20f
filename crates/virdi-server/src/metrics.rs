//! Metrics sideline: a bounded queue feeding a batched InfluxDB writer.
//!
//! Recording is fire-and-forget: a full queue drops the point rather than
//! slowing the production path. The writer batches points until either the
//! batch size or the flush interval is reached, then POSTs them as line
//! protocol. Closing every [`MetricsHandle`] drains the queue and flushes a
//! final batch.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use virdi_stream::ProductionObserver;

/// Bound on the in-flight queue; the original grew without limit.
const QUEUE_CAPACITY: usize = 10_000;

/// Pause after a failed write before the batch is retried.
const WRITE_BACKOFF: Duration = Duration::from_secs(10);

/// A field value in a metric point.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Integer field (`value=42i`).
    Integer(i64),
    /// Float field (`value=0.5`).
    Float(f64),
    /// String field (`value="text"`).
    Text(String),
}

/// One time-series point.
#[derive(Debug, Clone)]
pub struct MetricPoint {
    /// Measurement name.
    pub measurement: String,
    /// Indexed tags.
    pub tags: Vec<(String, String)>,
    /// Field set; at least one field is required by the line protocol.
    pub fields: Vec<(String, FieldValue)>,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_nanos: u128,
}

impl MetricPoint {
    /// A production event: who produced how much of what.
    pub fn production(client_id: &str, resource_id: &str, amount: u64) -> Self {
        Self {
            measurement: "production".to_string(),
            tags: vec![
                ("client_id".to_string(), client_id.to_string()),
                ("resource_id".to_string(), resource_id.to_string()),
            ],
            fields: vec![("amount".to_string(), FieldValue::Integer(amount as i64))],
            timestamp_nanos: now_nanos(),
        }
    }

    /// Renders the point as one InfluxDB line-protocol line.
    pub fn line(&self) -> String {
        let mut line = escape_measurement(&self.measurement);
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_tag(key));
            line.push('=');
            line.push_str(&escape_tag(value));
        }
        line.push(' ');
        for (index, (key, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                line.push(',');
            }
            line.push_str(&escape_tag(key));
            line.push('=');
            match value {
                FieldValue::Integer(v) => line.push_str(&format!("{v}i")),
                FieldValue::Float(v) => line.push_str(&v.to_string()),
                FieldValue::Text(v) => {
                    line.push('"');
                    line.push_str(&v.replace('\\', "\\\\").replace('"', "\\\""));
                    line.push('"');
                }
            }
        }
        line.push(' ');
        line.push_str(&self.timestamp_nanos.to_string());
        line
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

fn escape_measurement(value: &str) -> String {
    value.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Connection and batching settings, read from the environment.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// InfluxDB base URL.
    pub url: String,
    /// API token.
    pub token: String,
    /// Organisation name.
    pub org: String,
    /// Target bucket.
    pub bucket: String,
    /// Flush at least this often.
    pub flush_interval: Duration,
    /// Flush once this many points are pending.
    pub batch_size: usize,
}

impl MetricsConfig {
    /// Reads `INFLUXDB_*` and `METRICS_*` variables, falling back to the
    /// stock defaults.
    pub fn from_env() -> Self {
        Self {
            url: env_or("INFLUXDB_URL", "http://influxdb:8086"),
            token: env_or("INFLUXDB_TOKEN", ""),
            org: env_or("INFLUXDB_ORG", "virdi"),
            bucket: env_or("INFLUXDB_BUCKET", "virdi_metrics"),
            flush_interval: Duration::from_secs(
                env_or("METRICS_FLUSH_INTERVAL", "10").parse().unwrap_or(10),
            ),
            batch_size: env_or("METRICS_BATCH_SIZE", "500").parse().unwrap_or(500),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Cheap, cloneable producer side of the metrics queue.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    tx: mpsc::Sender<MetricPoint>,
}

impl MetricsHandle {
    /// Enqueues a point; drops it when the queue is full.
    pub fn record(&self, point: MetricPoint) {
        if self.tx.try_send(point).is_err() {
            debug!("metrics queue full, dropping point");
        }
    }

    /// Records a production event.
    pub fn production(&self, client_id: &str, resource_id: &str, amount: u64) {
        self.record(MetricPoint::production(client_id, resource_id, amount));
    }
}

impl ProductionObserver for MetricsHandle {
    async fn produced(&self, client_id: &str, resource_id: &str, amount: u64) {
        self.production(client_id, resource_id, amount);
    }
}

/// Spawns the writer task. The task ends, after a final flush, once every
/// handle clone has been dropped.
pub fn spawn(config: MetricsConfig) -> (MetricsHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let task = tokio::spawn(write_metrics(config, rx));
    (MetricsHandle { tx }, task)
}

async fn write_metrics(config: MetricsConfig, mut rx: mpsc::Receiver<MetricPoint>) {
    let client = reqwest::Client::new();
    let endpoint = format!(
        "{}/api/v2/write?org={}&bucket={}&precision=ns",
        config.url.trim_end_matches('/'),
        config.org,
        config.bucket
    );

    info!(endpoint = %endpoint, "starting metrics writer");

    let mut batch: Vec<MetricPoint> = Vec::with_capacity(config.batch_size);
    let mut flush_timer = tokio::time::interval(config.flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(point) => {
                    batch.push(point);
                    if batch.len() >= config.batch_size {
                        flush(&client, &endpoint, &config.token, &mut batch).await;
                    }
                }
                None => break,
            },
            _ = flush_timer.tick() => {
                if !batch.is_empty() {
                    flush(&client, &endpoint, &config.token, &mut batch).await;
                }
            }
        }
    }

    if !batch.is_empty() {
        flush(&client, &endpoint, &config.token, &mut batch).await;
    }
    info!("metrics writer stopped");
}

/// Writes the batch; on failure the batch is kept for the next attempt and
/// the writer backs off.
async fn flush(
    client: &reqwest::Client,
    endpoint: &str,
    token: &str,
    batch: &mut Vec<MetricPoint>,
) {
    let body = batch
        .iter()
        .map(MetricPoint::line)
        .collect::<Vec<_>>()
        .join("\n");

    debug!(points = batch.len(), "writing metrics");

    let result = client
        .post(endpoint)
        .header(reqwest::header::AUTHORIZATION, format!("Token {token}"))
        .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => batch.clear(),
        Ok(response) => {
            error!(status = %response.status(), "error writing metrics");
            tokio::time::sleep(WRITE_BACKOFF).await;
        }
        Err(err) => {
            error!(%err, "error writing metrics");
            tokio::time::sleep(WRITE_BACKOFF).await;
        }
    }
}
