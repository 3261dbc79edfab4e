//! Append-only JSON-lines event log for query latency and cache observability.
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct MetricsLogger {
    path: PathBuf,
}

/// Aggregate over the events inside a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub window_days: f64,
    pub total_events: usize,
    pub total_queries: usize,
    pub avg_latency_ms: f64,
    pub feedback_events: usize,
    pub index_events: usize,
    /// Embedding cache counters from the newest query record that carried them.
    pub cache: Option<CacheSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl MetricsLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Append one record. `fields` must be a JSON object (or null); its keys
    /// are merged next to `timestamp` and `event`.
    pub fn log(&self, event: &str, fields: Value) -> Result<()> {
        let mut entry = Map::new();
        entry.insert("timestamp".into(), Value::from(Utc::now().to_rfc3339()));
        entry.insert("event".into(), Value::from(event));
        match fields {
            Value::Object(map) => {
                for (k, v) in map {
                    if k != "timestamp" && k != "event" {
                        entry.insert(k, v);
                    }
                }
            }
            Value::Null => {}
            other => return Err(Error::InvalidConfig(format!("metrics fields must be an object, got {other}"))),
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", Value::Object(entry))?;
        Ok(())
    }

    /// Summarize events newer than `now - window`. Malformed lines are skipped.
    pub fn summarize(&self, window: Duration) -> Result<MetricsSummary> {
        let window_days = window.as_secs_f64() / 86_400.0;
        if !self.path.exists() {
            return Ok(MetricsSummary { window_days, ..Default::default() });
        }
        let span = chrono::Duration::from_std(window).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let cutoff = Utc::now().checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut summary = MetricsSummary { window_days, ..Default::default() };
        let mut latency_total = 0.0;
        let mut latest_cache: Option<DateTime<Utc>> = None;
        for (line_no, line) in fs::read_to_string(&self.path)?.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some(entry) = parse_entry(line) else {
                tracing::debug!(line = line_no + 1, "skipping malformed metrics record");
                continue;
            };
            if entry.at <= cutoff {
                continue;
            }
            summary.total_events += 1;
            match entry.event.as_str() {
                "query" => {
                    summary.total_queries += 1;
                    latency_total += entry.latency_ms;
                    match (entry.cache, latest_cache) {
                        (Some(_), Some(seen)) if entry.at < seen => {}
                        (Some(cache), _) => {
                            latest_cache = Some(entry.at);
                            summary.cache = Some(cache);
                        }
                        (None, _) => {}
                    }
                }
                "feedback" => summary.feedback_events += 1,
                "index" => summary.index_events += 1,
                _ => {}
            }
        }
        if summary.total_queries > 0 {
            summary.avg_latency_ms = latency_total / summary.total_queries as f64;
        }
        Ok(summary)
    }
}

struct Entry {
    at: DateTime<Utc>,
    event: String,
    latency_ms: f64,
    cache: Option<CacheSnapshot>,
}

fn parse_entry(line: &str) -> Option<Entry> {
    let value: Value = serde_json::from_str(line).ok()?;
    let at = parse_timestamp(value.get("timestamp")?.as_str()?)?;
    let event = value.get("event").and_then(Value::as_str).unwrap_or_default().to_string();
    let latency_ms = value.get("latency_ms").and_then(Value::as_f64).unwrap_or(0.0);
    let cache = value.get("cache").filter(|c| c.is_object()).map(|c| CacheSnapshot {
        hits: c.get("hits").and_then(Value::as_u64).unwrap_or(0),
        misses: c.get("misses").and_then(Value::as_u64).unwrap_or(0),
        hit_rate: c.get("hit_rate").and_then(Value::as_f64).unwrap_or(0.0),
    });
    Some(Entry { at, event, latency_ms, cache })
}

/// RFC 3339, or a naive ISO-8601 timestamp in local time (older logs were
/// written without an offset).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| Some(naive.and_utc()))
}
