//! EventStore - Partitioned Event/Alert Persistence
//!
//! ## Responsibilities
//!
//! - Append-only durable log of events and alerts
//! - One partition file per (case type, calendar date)
//! - Alert resolution, filtered queries, retention cleanup
//!
//! Writers serialize on a per-partition async mutex so concurrent appends
//! from different workers never interleave record bytes; appends to
//! different partitions do not contend. Records are one line each with a
//! fixed field order; metadata stays a single field as a flat `key=value`
//! blob.

use crate::error::{Error, Result};
use crate::models::{Alert, AlertSeverity, CaseType, Event};
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

const EVENT_HEADER: &str = "timestamp,stream_id,event_type,confidence,metadata";
const ALERT_HEADER: &str =
    "timestamp,stream_id,alert_type,severity,message,metadata,resolved,resolved_at";

/// Query filter for events and alerts
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub stream_id: Option<String>,
    pub case_type: Option<CaseType>,
    /// Inclusive partition-date range
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Maximum records returned, newest first
    pub limit: Option<usize>,
}

/// EventStore instance
pub struct EventStore {
    events_dir: PathBuf,
    alerts_dir: PathBuf,
    /// Per-partition write locks, keyed by `<kind>/<file name>`
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl EventStore {
    /// Create a store rooted at `root`, with `events/` and `alerts/`
    /// partition trees underneath.
    pub async fn new(root: &Path) -> Result<Self> {
        let events_dir = root.join("events");
        let alerts_dir = root.join("alerts");
        fs::create_dir_all(&events_dir)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", events_dir.display())))?;
        fs::create_dir_all(&alerts_dir)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", alerts_dir.display())))?;

        Ok(Self {
            events_dir,
            alerts_dir,
            locks: RwLock::new(HashMap::new()),
        })
    }

    /// Append one event to its `(case_type, date)` partition
    pub async fn append_event(&self, case_type: CaseType, event: &Event) -> Result<()> {
        if event.stream_id.trim().is_empty() || event.event_type.trim().is_empty() {
            return Err(Error::Validation(
                "event requires stream_id and event_type".into(),
            ));
        }
        if !event.confidence.is_finite() {
            return Err(Error::Validation("event confidence must be finite".into()));
        }

        let name = partition_name(case_type, event.timestamp.date_naive());
        let path = self.events_dir.join(&name);
        let lock = self.partition_lock(&format!("events/{name}")).await;
        let _guard = lock.lock().await;

        append_line(&path, EVENT_HEADER, &encode_event(event)).await?;

        tracing::debug!(
            stream_id = %event.stream_id,
            event_type = %event.event_type,
            partition = %name,
            "Event appended"
        );
        Ok(())
    }

    /// Append one alert to its `(case_type, date)` partition
    pub async fn append_alert(&self, case_type: CaseType, alert: &Alert) -> Result<()> {
        if alert.stream_id.trim().is_empty() || alert.alert_type.trim().is_empty() {
            return Err(Error::Validation(
                "alert requires stream_id and alert_type".into(),
            ));
        }

        let name = partition_name(case_type, alert.timestamp.date_naive());
        let path = self.alerts_dir.join(&name);
        let lock = self.partition_lock(&format!("alerts/{name}")).await;
        let _guard = lock.lock().await;

        append_line(&path, ALERT_HEADER, &encode_alert(alert)).await?;

        tracing::debug!(
            stream_id = %alert.stream_id,
            alert_type = %alert.alert_type,
            partition = %name,
            "Alert appended"
        );
        Ok(())
    }

    /// Query events, newest first
    pub async fn query_events(&self, filter: &QueryFilter) -> Result<Vec<Event>> {
        let partitions = self.matching_partitions(&self.events_dir, filter).await?;
        let mut out = Vec::new();

        for name in partitions {
            let content = self.read_partition(&self.events_dir, "events", &name).await?;
            for line in content.lines().skip(1).collect::<Vec<_>>().into_iter().rev() {
                let Some(event) = parse_event_line(line) else {
                    tracing::warn!(partition = %name, "Skipping malformed event record");
                    continue;
                };
                if let Some(ref sid) = filter.stream_id {
                    if event.stream_id != *sid {
                        continue;
                    }
                }
                out.push(event);
                if let Some(limit) = filter.limit {
                    if out.len() >= limit {
                        return Ok(out);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Query alerts, newest first
    pub async fn query_alerts(&self, filter: &QueryFilter) -> Result<Vec<Alert>> {
        let partitions = self.matching_partitions(&self.alerts_dir, filter).await?;
        let mut out = Vec::new();

        for name in partitions {
            let content = self.read_partition(&self.alerts_dir, "alerts", &name).await?;
            for line in content.lines().skip(1).collect::<Vec<_>>().into_iter().rev() {
                let Some(alert) = parse_alert_line(line) else {
                    tracing::warn!(partition = %name, "Skipping malformed alert record");
                    continue;
                };
                if let Some(ref sid) = filter.stream_id {
                    if alert.stream_id != *sid {
                        continue;
                    }
                }
                out.push(alert);
                if let Some(limit) = filter.limit {
                    if out.len() >= limit {
                        return Ok(out);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Query unresolved alerts, newest first
    pub async fn active_alerts(&self, filter: &QueryFilter) -> Result<Vec<Alert>> {
        let mut unlimited = filter.clone();
        unlimited.limit = None;

        let mut alerts = self.query_alerts(&unlimited).await?;
        alerts.retain(|a| !a.resolved);
        if let Some(limit) = filter.limit {
            alerts.truncate(limit);
        }
        Ok(alerts)
    }

    /// Resolve the alert identified by `(stream_id, timestamp)` — there is
    /// no synthetic key. Rewrites the owning partition under its lock.
    pub async fn resolve_alert(
        &self,
        case_type: CaseType,
        stream_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let name = partition_name(case_type, timestamp.date_naive());
        let path = self.alerts_dir.join(&name);
        let lock = self.partition_lock(&format!("alerts/{name}")).await;
        let _guard = lock.lock().await;

        if !fs::try_exists(&path)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?
        {
            return Err(Error::NotFound(format!(
                "alert {stream_id}@{}",
                timestamp.to_rfc3339()
            )));
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;

        let mut found = false;
        let mut lines: Vec<String> = vec![ALERT_HEADER.to_string()];
        for line in content.lines().skip(1) {
            match parse_alert_line(line) {
                Some(mut alert)
                    if alert.stream_id == stream_id && alert.timestamp == timestamp =>
                {
                    found = true;
                    if !alert.resolved {
                        alert.resolved = true;
                        alert.resolved_at = Some(Utc::now());
                    }
                    lines.push(encode_alert(&alert));
                }
                _ => lines.push(line.to_string()),
            }
        }

        if !found {
            return Err(Error::NotFound(format!(
                "alert {stream_id}@{}",
                timestamp.to_rfc3339()
            )));
        }

        let mut rewritten = lines.join("\n");
        rewritten.push('\n');
        fs::write(&path, rewritten)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;

        tracing::info!(stream_id = %stream_id, partition = %name, "Alert resolved");
        Ok(())
    }

    /// Delete event and alert partitions dated strictly before
    /// `today - retention_days`. Scheduling is the caller's concern.
    pub async fn cleanup(&self, retention_days: u32) -> Result<usize> {
        let cutoff = Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(retention_days as u64))
            .ok_or_else(|| Error::Validation(format!("bad retention_days {retention_days}")))?;

        let mut removed = 0;
        for (dir, kind) in [(&self.events_dir, "events"), (&self.alerts_dir, "alerts")] {
            for (name, date) in list_partitions(dir).await? {
                if date >= cutoff {
                    continue;
                }
                let lock = self.partition_lock(&format!("{kind}/{name}")).await;
                let _guard = lock.lock().await;
                let path = dir.join(&name);
                fs::remove_file(&path)
                    .await
                    .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;
                removed += 1;
                tracing::info!(partition = %name, kind = kind, "Expired partition removed");
            }
        }
        Ok(removed)
    }

    /// Partition names matching the filter, newest date first
    async fn matching_partitions(&self, dir: &Path, filter: &QueryFilter) -> Result<Vec<String>> {
        let mut partitions = list_partitions(dir).await?;
        partitions.retain(|(name, date)| {
            if let Some(want) = filter.case_type {
                let case = parse_partition_name(name).map(|(case, _)| case);
                if case != Some(want) {
                    return false;
                }
            }
            if let Some((from, to)) = filter.date_range {
                if *date < from || *date > to {
                    return false;
                }
            }
            true
        });
        partitions.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(partitions.into_iter().map(|(name, _)| name).collect())
    }

    async fn read_partition(&self, dir: &Path, kind: &str, name: &str) -> Result<String> {
        let lock = self.partition_lock(&format!("{kind}/{name}")).await;
        let _guard = lock.lock().await;
        let path = dir.join(name);
        fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))
    }

    /// Get the lock for a partition key (created on first use)
    async fn partition_lock(&self, key: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(key) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn partition_name(case_type: CaseType, date: NaiveDate) -> String {
    format!("{}_{}.csv", case_type.as_str(), date.format("%Y%m%d"))
}

fn parse_partition_name(name: &str) -> Option<(CaseType, NaiveDate)> {
    let stem = name.strip_suffix(".csv")?;
    let (case, date) = stem.rsplit_once('_')?;
    Some((
        case.parse().ok()?,
        NaiveDate::parse_from_str(date, "%Y%m%d").ok()?,
    ))
}

async fn list_partitions(dir: &Path) -> Result<Vec<(String, NaiveDate)>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::Storage(format!("{}: {e}", dir.display())))?;

    let mut out = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::Storage(format!("{}: {e}", dir.display())))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some((_, date)) = parse_partition_name(&name) {
            out.push((name, date));
        }
    }
    Ok(out)
}

/// Append one record, creating the partition (and header) if absent.
/// Callers hold the partition lock; the record goes out in a single write.
async fn append_line(path: &Path, header: &str, line: &str) -> Result<()> {
    let exists = fs::try_exists(path)
        .await
        .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;
    if !exists {
        fs::write(path, format!("{header}\n"))
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;
    }

    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;
    file.write_all(format!("{line}\n").as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;
    file.flush()
        .await
        .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;
    Ok(())
}

/// Strip the field and record separators out of free-text values so every
/// record stays one line with a fixed field count.
fn sanitize(value: &str) -> String {
    value.replace([',', ';', '=', '\n', '\r'], " ")
}

fn encode_metadata(metadata: &BTreeMap<String, String>) -> String {
    metadata
        .iter()
        .map(|(k, v)| format!("{}={}", sanitize(k), sanitize(v)))
        .collect::<Vec<_>>()
        .join(";")
}

fn decode_metadata(blob: &str) -> BTreeMap<String, String> {
    blob.split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.to_string(), v.to_string()))
        })
        .collect()
}

fn encode_event(event: &Event) -> String {
    format!(
        "{},{},{},{},{}",
        event.timestamp.to_rfc3339(),
        sanitize(&event.stream_id),
        sanitize(&event.event_type),
        event.confidence,
        encode_metadata(&event.metadata)
    )
}

fn parse_event_line(line: &str) -> Option<Event> {
    let mut fields = line.splitn(5, ',');
    let timestamp = DateTime::parse_from_rfc3339(fields.next()?)
        .ok()?
        .with_timezone(&Utc);
    let stream_id = fields.next()?.to_string();
    let event_type = fields.next()?.to_string();
    let confidence: f32 = fields.next()?.parse().ok()?;
    let metadata = decode_metadata(fields.next()?);
    Some(Event {
        timestamp,
        stream_id,
        event_type,
        confidence,
        metadata,
    })
}

fn encode_alert(alert: &Alert) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        alert.timestamp.to_rfc3339(),
        sanitize(&alert.stream_id),
        sanitize(&alert.alert_type),
        alert.severity,
        sanitize(&alert.message),
        encode_metadata(&alert.metadata),
        alert.resolved,
        alert
            .resolved_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    )
}

fn parse_alert_line(line: &str) -> Option<Alert> {
    let mut fields = line.splitn(8, ',');
    let timestamp = DateTime::parse_from_rfc3339(fields.next()?)
        .ok()?
        .with_timezone(&Utc);
    let stream_id = fields.next()?.to_string();
    let alert_type = fields.next()?.to_string();
    let severity: AlertSeverity = fields.next()?.parse().ok()?;
    let message = fields.next()?.to_string();
    let metadata = decode_metadata(fields.next()?);
    let resolved: bool = fields.next()?.parse().ok()?;
    let resolved_at = match fields.next()? {
        "" => None,
        raw => Some(DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc)),
    };
    Some(Alert {
        timestamp,
        stream_id,
        alert_type,
        severity,
        message,
        metadata,
        resolved,
        resolved_at,
    })
}
