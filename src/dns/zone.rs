//! Zone publication.
//!
//! [`Zone`] keeps the latest record set of every scope, merges them and
//! forwards the result to a [`ZoneSink`] only when it actually changed.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ConfigHasher;
use crate::error::{DnsError, Result};

use super::record::{Record, ensure_dot_suffix};

/// Receives the merged record set of a scope.
///
/// Must be idempotent under repeated identical input and safe to call from
/// several scopes at once.
#[async_trait]
pub trait ZonePublisher: Send + Sync {
    /// Publishes the full record set of `scope`.
    async fn publish(&self, scope: &str, records: Vec<Record>) -> Result<()>;
}

/// Destination of a merged zone.
#[async_trait]
pub trait ZoneSink: Send + Sync {
    /// Writes every record of the zone.
    async fn write(&self, zone: &str, records: &[Record]) -> Result<()>;
}

#[derive(Debug, Default)]
struct ZoneState {
    scopes: BTreeMap<String, Vec<Record>>,
    last_digest: Option<String>,
}

/// Aggregates scopes into one zone.
pub struct Zone {
    name: String,
    suffix: String,
    sink: Arc<dyn ZoneSink>,
    hasher: ConfigHasher,
    state: Mutex<ZoneState>,
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Zone {
    /// Creates a zone writing to `sink`.
    pub fn new(name: impl Into<String>, sink: Arc<dyn ZoneSink>) -> Self {
        let name = name.into();
        Self {
            suffix: ensure_dot_suffix(&name),
            name,
            sink,
            hasher: ConfigHasher::new(),
            state: Mutex::new(ZoneState::default()),
        }
    }

    /// Zone name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn in_zone(&self, record: &Record) -> bool {
        record.fqdn == self.suffix || record.fqdn.ends_with(&format!(".{}", self.suffix))
    }

    /// The current merged record set.
    pub async fn records(&self) -> Vec<Record> {
        Self::merge(&self.state.lock().await.scopes)
    }

    fn merge(scopes: &BTreeMap<String, Vec<Record>>) -> Vec<Record> {
        let mut records: Vec<Record> = scopes.values().flatten().cloned().collect();
        records.sort();
        records.dedup();
        records
    }
}

#[async_trait]
impl ZonePublisher for Zone {
    async fn publish(&self, scope: &str, records: Vec<Record>) -> Result<()> {
        let (kept, dropped): (Vec<Record>, Vec<Record>) =
            records.into_iter().partition(|r| self.in_zone(r));
        for record in &dropped {
            warn!("Ignoring {record}: not in zone {}", self.name);
        }

        let mut state = self.state.lock().await;
        state.scopes.insert(scope.to_string(), kept);
        let merged = Self::merge(&state.scopes);

        let digest = self.hasher.hash_value(&merged);
        if state.last_digest.as_deref() == Some(digest.as_str()) {
            debug!("Zone {} unchanged after publish from {scope}", self.name);
            return Ok(());
        }

        self.sink
            .write(&self.name, &merged)
            .await
            .map_err(|e| DnsError::Publish {
                scope: scope.to_string(),
                message: e.to_string(),
            })?;
        info!("Published zone {} with {} records", self.name, merged.len());
        state.last_digest = Some(digest);
        Ok(())
    }
}

#[derive(Serialize)]
struct ZoneDocument<'a> {
    zone: &'a str,
    records: &'a [Record],
}

/// Writes the zone as a YAML file.
#[derive(Debug, Clone)]
pub struct ZoneFile {
    path: PathBuf,
}

impl ZoneFile {
    /// Creates a sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ZoneSink for ZoneFile {
    async fn write(&self, zone: &str, records: &[Record]) -> Result<()> {
        let content = serde_yaml::to_string(&ZoneDocument { zone, records }).map_err(|e| {
            DnsError::Publish {
                scope: zone.to_string(),
                message: e.to_string(),
            }
        })?;
        // Replace atomically so readers never see a partial file.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Logs every record instead of writing it anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl ZoneSink for LogSink {
    async fn write(&self, zone: &str, records: &[Record]) -> Result<()> {
        info!("Zone {zone}:");
        for record in records {
            info!("  {record}");
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Publisher that records every call.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingPublisher {
        calls: Mutex<Vec<(String, Vec<Record>)>>,
    }

    impl RecordingPublisher {
        pub(crate) async fn published(&self) -> Vec<(String, Vec<Record>)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl ZonePublisher for RecordingPublisher {
        async fn publish(&self, scope: &str, records: Vec<Record>) -> Result<()> {
            self.calls.lock().await.push((scope.to_string(), records));
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CountingSink {
        writes: Mutex<Vec<Vec<Record>>>,
    }

    #[async_trait]
    impl ZoneSink for CountingSink {
        async fn write(&self, _zone: &str, records: &[Record]) -> Result<()> {
            self.writes.lock().await.push(records.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_scopes_are_merged() {
        let sink = Arc::new(CountingSink::default());
        let zone = Zone::new("example.com", sink.clone());

        zone.publish("ingress", vec![Record::cname("a.example.com", "lb")])
            .await
            .unwrap();
        zone.publish("service", vec![Record::a("b.example.com", "10.0.0.1")])
            .await
            .unwrap();

        let writes = sink.writes.lock().await;
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].len(), 2);
    }

    #[tokio::test]
    async fn test_identical_publish_is_skipped() {
        let sink = Arc::new(CountingSink::default());
        let zone = Zone::new("example.com", sink.clone());
        let records = vec![Record::cname("a.example.com", "lb")];

        zone.publish("ingress", records.clone()).await.unwrap();
        zone.publish("ingress", records).await.unwrap();

        assert_eq!(sink.writes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_records_outside_zone_are_dropped() {
        let sink = Arc::new(CountingSink::default());
        let zone = Zone::new("example.com", sink);

        zone.publish(
            "ingress",
            vec![
                Record::cname("a.example.com", "lb"),
                Record::cname("a.example.org", "lb"),
                Record::cname("notexample.com", "lb"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(zone.records().await, vec![Record::cname("a.example.com", "lb")]);
    }

    #[tokio::test]
    async fn test_concurrent_publishes_merge() {
        let sink = Arc::new(CountingSink::default());
        let zone = Arc::new(Zone::new("example.com", sink));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let zone = zone.clone();
                tokio::spawn(async move {
                    zone.publish(
                        &format!("scope-{i}"),
                        vec![Record::a(&format!("h{i}.example.com"), "10.0.0.1")],
                    )
                    .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(zone.records().await.len(), 8);
    }

    #[tokio::test]
    async fn test_zone_file_written_as_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zone.yaml");
        let zone = Zone::new("example.com", Arc::new(ZoneFile::new(&path)));

        zone.publish("ingress", vec![Record::cname("foo.example.com", "lb.example.com")])
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("zone: example.com"));
        assert!(content.contains("fqdn: foo.example.com."));
        assert!(content.contains("type: CNAME"));
    }
}
